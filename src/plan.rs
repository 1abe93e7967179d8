//! The code-generation plan.
//!
//! A [`Plan`] is everything the emitter needs to render the generated
//! artifacts, derived deterministically from a validated [`crate::edl::Edl`]:
//! the developer types to declare, the ABI schema, the per-direction stub and
//! dispatcher specifications, the outer-side address table and the inner-side
//! export list. Identical IR yields identical plans; every name in a plan is
//! derived from IR names and fixed suffixes.

pub mod emit;

/// A complete code-generation plan for one EDL file.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// The EDL name; artifact file names derive from it.
    pub name: String,
    /// Every developer type, in definition order.
    pub types: Vec<TypePlan>,
    /// Names of the developer types transitively referenced by function
    /// parameters or returns, in definition order. The ABI schema declares
    /// exactly these.
    pub schema_types: Vec<String>,
    /// The ABI serialization schema.
    pub schema: Schema,
    /// One entry per `trusted` function (outer stub, inner dispatcher,
    /// inner implementation declaration, exported entry).
    pub host_to_enclave: Vec<FunctionPlan>,
    /// One entry per `untrusted` function (inner stub, outer dispatcher,
    /// outer implementation declaration, address table entry).
    pub enclave_to_host: Vec<FunctionPlan>,
    /// Outer-side table mapping ABI names to dispatcher function pointers,
    /// for name-based lookup from the inner side.
    pub address_table: Vec<AddressEntry>,
    /// Inner-side exported entry symbols, one per trusted function.
    pub exports: Vec<ExportEntry>,
}

/// A developer type as it appears in the types header.
#[derive(Debug, Clone, PartialEq)]
pub enum TypePlan {
    Enum(EnumPlan),
    Struct(StructPlan),
}

impl TypePlan {
    pub fn name(&self) -> &str {
        match self {
            TypePlan::Enum(plan) => &plan.name,
            TypePlan::Struct(plan) => &plan.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumPlan {
    pub name: String,
    /// Anonymous enums render as plain constants rather than an `enum class`.
    pub anonymous: bool,
    pub items: Vec<EnumItemPlan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItemPlan {
    pub name: String,
    pub value: u64,
    /// Render the value in hexadecimal.
    pub hex: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructPlan {
    pub name: String,
    pub fields: Vec<FieldPlan>,
    pub contains_inner_pointer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    pub name: String,
    /// The declared C++ type, e.g. `std::uint8_t*` or `std::vector<Widget>`.
    pub cpp_type: String,
    /// Fixed dimension (integer literal or anonymous enum item name).
    pub array_dimension: Option<String>,
    pub lowering: Lowering,
}

/// How a declaration crosses the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowering {
    /// Copied by value (scalars, enums, structs, vectors, arrays).
    Value,
    /// A pointer lowered to a length-prefixed byte buffer.
    Buffer {
        /// The size/count expression: a sibling declaration name, an
        /// anonymous enum item, or an integer literal.
        length_from: String,
        /// The length counts elements (`count=`) rather than bytes (`size=`).
        length_is_count: bool,
    },
}

/// The ABI schema, in a flatbuffer-compatible IR. Entry order follows the
/// dependency rules: enums, then structs in definition order, then the
/// per-function parameter tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub entries: Vec<SchemaEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaEntry {
    Enum(SchemaEnum),
    Table(SchemaTable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEnum {
    pub name: String,
    pub items: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTable {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub ty: SchemaType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    /// A flatbuffer scalar type name (`uint32`, `double`, ...).
    Scalar(&'static str),
    /// A reference to a schema enum or table.
    Named(String),
    /// A lowered pointer: a byte buffer whose length is governed by the
    /// named size/count value.
    Bytes { length_from: String },
    /// `vector<T>` and fixed arrays.
    Sequence(Box<SchemaType>),
}

/// Direction of a boundary crossing, from the outer side's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallDirection {
    /// A `trusted` function: outer code calls into the inner side.
    HostToEnclave,
    /// An `untrusted` function: inner code calls back out.
    EnclaveToHost,
}

/// Everything needed to render the stub, dispatcher and implementation
/// declaration of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPlan {
    pub name: String,
    pub abi_name: String,
    pub direction: CallDirection,
    /// The declared C++ return type (`void` when none).
    pub return_type: String,
    pub returns_value: bool,
    pub parameters: Vec<ParamPlan>,
    /// Schema table holding parameters whose direction includes `in`.
    pub input_table: String,
    /// Schema table holding parameters whose direction includes `out`, plus
    /// the return value.
    pub output_table: String,
}

impl FunctionPlan {
    pub fn in_params(&self) -> impl Iterator<Item = &ParamPlan> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.direction.includes_in())
    }

    pub fn out_params(&self) -> impl Iterator<Item = &ParamPlan> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.direction.includes_out())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamDirection {
    In,
    Out,
    InOut,
}

impl ParamDirection {
    pub fn includes_in(self) -> bool {
        matches!(self, ParamDirection::In | ParamDirection::InOut)
    }

    pub fn includes_out(self) -> bool {
        matches!(self, ParamDirection::Out | ParamDirection::InOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamPlan {
    pub name: String,
    /// The declared C++ type, e.g. `std::uint8_t*`.
    pub cpp_type: String,
    pub direction: ParamDirection,
    pub lowering: Lowering,
    pub is_pointer: bool,
    pub is_container: bool,
    pub is_struct: bool,
    /// Fixed dimension (integer literal or anonymous enum item name).
    pub array_dimension: Option<String>,
}

impl ParamPlan {
    /// The element type a buffer pointer covers, e.g. `std::uint8_t` for a
    /// `std::uint8_t*` parameter.
    pub fn element_type(&self) -> &str {
        self.cpp_type.trim_end_matches('*')
    }
}

/// One outer-side address table entry: an ABI name resolvable from the inner
/// side to a dispatcher (or allocation callback) function pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressEntry {
    pub abi_name: String,
    pub symbol: String,
}

/// One inner-side exported entry point. The exported symbol is the ABI name;
/// its body forwards to the inner dispatcher templated on the function's
/// parameter tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub symbol: String,
    pub dispatcher: String,
}
