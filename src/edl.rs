//! The parsed representation of an EDL file.
//!
//! An EDL file describes the call boundary between two trust domains: the
//! *outer* (host) side and the *inner* (isolated) side. `trusted` functions
//! are implemented inside and called from outside; `untrusted` functions are
//! the reverse. Everything in this module is produced by [`parse`] and is
//! read-only afterwards: the planner and emitter never mutate the IR.

use std::collections::HashMap;

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};

use crate::files::FileId;
use crate::reporting::Message;

/// The reserved name under which all anonymous `enum { .. }` blocks in a
/// file accumulate.
pub const ANONYMOUS_ENUM_NAME: &str = "_AnonymousEnum_";

/// The synthesised name of every function's return declaration.
pub const RETURN_VALUE_NAME: &str = "_return_value_";

/// Structural keywords of the language. Type words are reserved separately,
/// through [`type_kind_from_keyword`].
pub const KEYWORDS: &[&str] = &["enclave", "trusted", "untrusted", "enum", "struct"];

pub fn is_reserved_word(word: &str) -> bool {
    KEYWORDS.iter().any(|keyword| word == *keyword) || type_kind_from_keyword(word).is_some()
}

/// The closed set of type shapes a declaration can have.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EdlTypeKind {
    Void,
    Bool,
    Char,
    WChar,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    SizeT,
    Float,
    Double,
    HResult,
    Vector,
    Struct,
    Enum,
    AnonymousEnum,
    Ptr,
}

/// Map a reserved type word to its kind. `Struct`, `Enum`, `AnonymousEnum`
/// and `Ptr` have no keyword: they are produced by the parser from context.
pub fn type_kind_from_keyword(word: &str) -> Option<EdlTypeKind> {
    match word {
        "void" => Some(EdlTypeKind::Void),
        "bool" => Some(EdlTypeKind::Bool),
        "char" => Some(EdlTypeKind::Char),
        "wchar_t" => Some(EdlTypeKind::WChar),
        "int8_t" => Some(EdlTypeKind::Int8),
        "int16_t" => Some(EdlTypeKind::Int16),
        "int32_t" => Some(EdlTypeKind::Int32),
        "int64_t" => Some(EdlTypeKind::Int64),
        "uint8_t" => Some(EdlTypeKind::UInt8),
        "uint16_t" => Some(EdlTypeKind::UInt16),
        "uint32_t" => Some(EdlTypeKind::UInt32),
        "uint64_t" => Some(EdlTypeKind::UInt64),
        "size_t" => Some(EdlTypeKind::SizeT),
        "float" => Some(EdlTypeKind::Float),
        "double" => Some(EdlTypeKind::Double),
        "HRESULT" => Some(EdlTypeKind::HResult),
        "vector" => Some(EdlTypeKind::Vector),
        _ => None,
    }
}

impl EdlTypeKind {
    /// Types that may carry a `size`/`count` attribute's referenced value.
    pub fn is_valid_size_or_count_type(self) -> bool {
        matches!(
            self,
            EdlTypeKind::UInt8
                | EdlTypeKind::UInt16
                | EdlTypeKind::UInt32
                | EdlTypeKind::UInt64
                | EdlTypeKind::SizeT
        )
    }
}

/// A resolved type reference. `inner` is populated only for `vector<T>` and
/// is never itself a vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EdlTypeInfo {
    pub name: String,
    pub kind: EdlTypeKind,
    pub is_pointer: bool,
    pub inner: Option<Box<EdlTypeInfo>>,
}

impl EdlTypeInfo {
    pub fn new(name: impl Into<String>, kind: EdlTypeKind) -> EdlTypeInfo {
        EdlTypeInfo {
            name: name.into(),
            kind,
            is_pointer: false,
            inner: None,
        }
    }

    /// The type as written in the source, e.g. `vector<Widget>` or `uint8_t*`.
    pub fn display_name(&self) -> String {
        let mut name = self.name.clone();
        if let Some(inner) = &self.inner {
            name.push('<');
            name.push_str(&inner.display_name());
            name.push('>');
        }
        if self.is_pointer {
            name.push('*');
        }
        name
    }
}

/// Whether a declaration belongs to a struct body or a parameter list. Some
/// rules (attribute whitelists, default direction) depend on this.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeclarationParentKind {
    Struct,
    Function,
}

/// Which block a function was declared in: `trusted` functions live on the
/// inner side and are callable from the outer side, `untrusted` functions
/// are the reverse.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    Trusted,
    Untrusted,
}

/// The parsed `[in, out, size=.., count=..]` annotation block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAttributeInfo {
    pub in_present: bool,
    pub out_present: bool,
    /// Maintained as `in_present && out_present`.
    pub in_and_out_present: bool,
    pub size_info: Option<Token>,
    pub count_info: Option<Token>,
}

impl ParsedAttributeInfo {
    pub fn in_only() -> ParsedAttributeInfo {
        ParsedAttributeInfo {
            in_present: true,
            ..ParsedAttributeInfo::default()
        }
    }

    pub fn is_size_or_count_present(&self) -> bool {
        self.size_info.is_some() || self.count_info.is_some()
    }
}

/// A struct field, function parameter, or function return slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub parent_kind: DeclarationParentKind,
    pub name: String,
    pub type_info: EdlTypeInfo,
    /// At most one dimension; each token is an unsigned integer literal or
    /// the name of an anonymous-enum item.
    pub array_dimensions: Vec<Token>,
    pub attribute_info: Option<ParsedAttributeInfo>,
}

impl Declaration {
    pub fn has_pointer(&self) -> bool {
        self.type_info.is_pointer
    }

    pub fn is_container(&self) -> bool {
        self.type_info.kind == EdlTypeKind::Vector
    }

    pub fn is_edl_type(&self, kind: EdlTypeKind) -> bool {
        self.type_info.kind == kind
    }
}

/// One item of an enum definition.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub name: String,
    pub declared_position: u64,
    /// Hex formatting latches: an item without an explicit value renders hex
    /// iff the previous explicit value was hex.
    pub is_hex: bool,
    /// The first item of an enum is its default value.
    pub is_default_value: bool,
    pub explicit_value: Option<Token>,
}

/// A user-defined enum, anonymous enum, or struct.
#[derive(Debug, Clone, PartialEq)]
pub struct DeveloperType {
    pub name: String,
    pub kind: EdlTypeKind,
    pub fields: Vec<Declaration>,
    /// Enum items in declaration order.
    pub items: Vec<EnumItem>,
    /// Set if any field (possibly through a chain of struct-typed fields)
    /// is a pointer.
    pub contains_inner_pointer: bool,
    /// Set if any field (possibly transitively) is a vector.
    pub contains_container_type: bool,
}

impl DeveloperType {
    pub fn new(name: impl Into<String>, kind: EdlTypeKind) -> DeveloperType {
        DeveloperType {
            name: name.into(),
            kind,
            fields: Vec::new(),
            items: Vec::new(),
            contains_inner_pointer: false,
            contains_container_type: false,
        }
    }

    pub fn item(&self, name: &str) -> Option<&EnumItem> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.item(name).is_some()
    }
}

/// A boundary-crossing function from a `trusted` or `untrusted` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// The unique transport-level name, `{name}_{index}` with one monotonic
    /// index shared across both blocks of a file.
    pub abi_name: String,
    /// Synthesised declaration named [`RETURN_VALUE_NAME`], direction `out`,
    /// never a pointer.
    pub return_info: Declaration,
    pub parameters: Vec<Declaration>,
}

impl Function {
    /// The signature used for duplicate detection: name plus parameter types
    /// and directions. Overloads differing only in parameter names collide.
    pub fn declaration_signature(&self) -> String {
        use itertools::Itertools;

        let parameters = self
            .parameters
            .iter()
            .map(|parameter| {
                let direction = match &parameter.attribute_info {
                    Some(info) if info.in_and_out_present => "inout ",
                    Some(info) if info.out_present => "out ",
                    Some(info) if info.in_present => "in ",
                    _ => "",
                };
                format!("{}{}", direction, parameter.type_info.display_name())
            })
            .join(", ");

        format!("{}({})", self.name, parameters)
    }

    pub fn returns_value(&self) -> bool {
        self.return_info.type_info.kind != EdlTypeKind::Void
    }
}

/// A fully parsed and validated EDL file.
#[derive(Debug, Clone, PartialEq)]
pub struct Edl {
    /// The file stem of the source file.
    pub name: String,
    pub developer_types: HashMap<String, DeveloperType>,
    /// Names of `developer_types`, in definition order. Emission is
    /// order-sensitive, so consumers iterate through [`Edl::types_in_order`].
    pub developer_types_order: Vec<String>,
    pub trusted_functions: Vec<Function>,
    pub untrusted_functions: Vec<Function>,
}

impl Edl {
    /// Developer types in the order they were defined in the source file.
    pub fn types_in_order(&self) -> impl Iterator<Item = &DeveloperType> {
        self.developer_types_order
            .iter()
            .map(|name| &self.developer_types[name])
    }

    pub fn anonymous_enum(&self) -> Option<&DeveloperType> {
        self.developer_types.get(ANONYMOUS_ENUM_NAME)
    }
}

/// Parse and analyse one EDL source. `name` is the file stem that becomes
/// [`Edl::name`]. The first error aborts the file: no partial IR escapes.
pub fn parse(file_id: FileId, name: &str, source: &str) -> Result<Edl, Message> {
    parser::Parser::new(file_id, name, source)?.parse()
}
