//! Derives a code-generation [`Plan`] from a validated [`Edl`].
//!
//! The pass never mutates the IR and uses only names found in it (plus fixed
//! suffixes), so the same IR always produces the same plan. Ordering rules:
//! schema entries declare enums first, then structs in definition order, then
//! the per-function parameter tables (trusted before untrusted, declaration
//! order within each block); definition order already guarantees that
//! dependencies precede their dependents because forward references are
//! rejected during parsing.

use std::collections::HashSet;

use crate::edl::{Declaration, DeveloperType, Edl, EdlTypeInfo, EdlTypeKind, Function};
use crate::plan::{
    AddressEntry, CallDirection, EnumItemPlan, EnumPlan, ExportEntry, FieldPlan, FunctionPlan,
    Lowering, ParamDirection, ParamPlan, Plan, Schema, SchemaEntry, SchemaEnum, SchemaField,
    SchemaTable, SchemaType, StructPlan, TypePlan,
};

/// The ABI names of the allocation callbacks the inner side uses to allocate
/// and release outer memory. They head the address table so the inner runtime
/// can resolve them before any developer callback.
pub const OUTER_ALLOC_ABI_NAME: &str = "outer_alloc";
pub const OUTER_DEALLOC_ABI_NAME: &str = "outer_dealloc";

pub fn plan(edl: &Edl) -> Plan {
    let types = edl.types_in_order().map(plan_type).collect();
    let schema_types = referenced_type_names(edl);
    let schema = plan_schema(edl);

    let host_to_enclave = edl
        .trusted_functions
        .iter()
        .map(|function| plan_function(function, CallDirection::HostToEnclave))
        .collect::<Vec<_>>();
    let enclave_to_host = edl
        .untrusted_functions
        .iter()
        .map(|function| plan_function(function, CallDirection::EnclaveToHost))
        .collect::<Vec<_>>();

    let address_table = std::iter::empty()
        .chain([
            AddressEntry {
                abi_name: OUTER_ALLOC_ABI_NAME.to_owned(),
                symbol: "edlrt::outer_alloc".to_owned(),
            },
            AddressEntry {
                abi_name: OUTER_DEALLOC_ABI_NAME.to_owned(),
                symbol: "edlrt::outer_dealloc".to_owned(),
            },
        ])
        .chain(edl.untrusted_functions.iter().map(|function| AddressEntry {
            abi_name: function.abi_name.clone(),
            symbol: dispatcher_name(function),
        }))
        .collect();

    let exports = edl
        .trusted_functions
        .iter()
        .map(|function| ExportEntry {
            symbol: function.abi_name.clone(),
            dispatcher: dispatcher_name(function),
        })
        .collect();

    Plan {
        name: edl.name.clone(),
        types,
        schema_types,
        schema,
        host_to_enclave,
        enclave_to_host,
        address_table,
        exports,
    }
}

fn dispatcher_name(function: &Function) -> String {
    format!("{}_dispatch", function.abi_name)
}

fn plan_type(developer_type: &DeveloperType) -> TypePlan {
    match developer_type.kind {
        EdlTypeKind::Struct => TypePlan::Struct(StructPlan {
            name: developer_type.name.clone(),
            fields: developer_type.fields.iter().map(plan_field).collect(),
            contains_inner_pointer: developer_type.contains_inner_pointer,
        }),
        _ => TypePlan::Enum(EnumPlan {
            name: developer_type.name.clone(),
            anonymous: developer_type.kind == EdlTypeKind::AnonymousEnum,
            items: developer_type
                .items
                .iter()
                .map(|item| EnumItemPlan {
                    name: item.name.clone(),
                    value: item.declared_position,
                    hex: item.is_hex,
                })
                .collect(),
        }),
    }
}

fn plan_field(field: &Declaration) -> FieldPlan {
    FieldPlan {
        name: field.name.clone(),
        cpp_type: cpp_type(&field.type_info),
        array_dimension: field
            .array_dimensions
            .first()
            .map(|dimension| dimension.text.clone()),
        lowering: lowering(field),
    }
}

fn plan_function(function: &Function, direction: CallDirection) -> FunctionPlan {
    FunctionPlan {
        name: function.name.clone(),
        abi_name: function.abi_name.clone(),
        direction,
        return_type: cpp_type(&function.return_info.type_info),
        returns_value: function.returns_value(),
        parameters: function.parameters.iter().map(plan_parameter).collect(),
        input_table: format!("{}_args", function.abi_name),
        output_table: format!("{}_result", function.abi_name),
    }
}

fn plan_parameter(parameter: &Declaration) -> ParamPlan {
    let direction = match &parameter.attribute_info {
        Some(info) if info.in_and_out_present => ParamDirection::InOut,
        Some(info) if info.out_present => ParamDirection::Out,
        _ => ParamDirection::In,
    };

    ParamPlan {
        name: parameter.name.clone(),
        cpp_type: cpp_type(&parameter.type_info),
        direction,
        lowering: lowering(parameter),
        is_pointer: parameter.has_pointer(),
        is_container: parameter.is_container(),
        is_struct: parameter.is_edl_type(EdlTypeKind::Struct),
        array_dimension: parameter
            .array_dimensions
            .first()
            .map(|dimension| dimension.text.clone()),
    }
}

/// How a declaration's payload crosses the boundary. Pointers become
/// length-prefixed byte buffers governed by their size/count value; an
/// unannotated (non-void) pointer covers a single element.
fn lowering(declaration: &Declaration) -> Lowering {
    if !declaration.has_pointer() {
        return Lowering::Value;
    }

    let info = declaration.attribute_info.as_ref();
    if let Some(token) = info.and_then(|info| info.size_info.as_ref()) {
        Lowering::Buffer {
            length_from: token.text.clone(),
            length_is_count: false,
        }
    } else if let Some(token) = info.and_then(|info| info.count_info.as_ref()) {
        Lowering::Buffer {
            length_from: token.text.clone(),
            length_is_count: true,
        }
    } else {
        Lowering::Buffer {
            length_from: "1".to_owned(),
            length_is_count: true,
        }
    }
}

/// The C++ spelling of a declared type.
fn cpp_type(type_info: &EdlTypeInfo) -> String {
    let base = match type_info.kind {
        EdlTypeKind::Void => "void".to_owned(),
        EdlTypeKind::Bool => "bool".to_owned(),
        EdlTypeKind::Char => "char".to_owned(),
        EdlTypeKind::WChar => "wchar_t".to_owned(),
        EdlTypeKind::Int8 => "std::int8_t".to_owned(),
        EdlTypeKind::Int16 => "std::int16_t".to_owned(),
        EdlTypeKind::Int32 => "std::int32_t".to_owned(),
        EdlTypeKind::Int64 => "std::int64_t".to_owned(),
        EdlTypeKind::UInt8 => "std::uint8_t".to_owned(),
        EdlTypeKind::UInt16 => "std::uint16_t".to_owned(),
        EdlTypeKind::UInt32 => "std::uint32_t".to_owned(),
        EdlTypeKind::UInt64 => "std::uint64_t".to_owned(),
        EdlTypeKind::SizeT => "std::size_t".to_owned(),
        EdlTypeKind::Float => "float".to_owned(),
        EdlTypeKind::Double => "double".to_owned(),
        EdlTypeKind::HResult => "HRESULT".to_owned(),
        EdlTypeKind::Vector => match &type_info.inner {
            Some(inner) => format!("std::vector<{}>", cpp_type(inner)),
            None => "std::vector<>".to_owned(),
        },
        EdlTypeKind::Struct
        | EdlTypeKind::Enum
        | EdlTypeKind::AnonymousEnum
        | EdlTypeKind::Ptr => type_info.name.clone(),
    };

    if type_info.is_pointer {
        format!("{}*", base)
    } else {
        base
    }
}

/// The schema spelling of a non-pointer type.
fn schema_type(type_info: &EdlTypeInfo) -> SchemaType {
    match type_info.kind {
        EdlTypeKind::Bool => SchemaType::Scalar("bool"),
        EdlTypeKind::Char | EdlTypeKind::Int8 => SchemaType::Scalar("int8"),
        EdlTypeKind::Int16 => SchemaType::Scalar("int16"),
        EdlTypeKind::Int32 | EdlTypeKind::HResult => SchemaType::Scalar("int32"),
        EdlTypeKind::Int64 => SchemaType::Scalar("int64"),
        EdlTypeKind::UInt8 => SchemaType::Scalar("uint8"),
        EdlTypeKind::WChar | EdlTypeKind::UInt16 => SchemaType::Scalar("uint16"),
        EdlTypeKind::UInt32 => SchemaType::Scalar("uint32"),
        EdlTypeKind::UInt64 | EdlTypeKind::SizeT => SchemaType::Scalar("uint64"),
        EdlTypeKind::Float => SchemaType::Scalar("float"),
        EdlTypeKind::Double => SchemaType::Scalar("double"),
        EdlTypeKind::Vector => match &type_info.inner {
            Some(inner) => SchemaType::Sequence(Box::new(schema_type(inner))),
            None => SchemaType::Sequence(Box::new(SchemaType::Scalar("uint8"))),
        },
        EdlTypeKind::Struct
        | EdlTypeKind::Enum
        | EdlTypeKind::AnonymousEnum
        | EdlTypeKind::Void
        | EdlTypeKind::Ptr => SchemaType::Named(type_info.name.clone()),
    }
}

fn schema_field(declaration: &Declaration) -> SchemaField {
    let ty = match lowering(declaration) {
        Lowering::Buffer { length_from, .. } => SchemaType::Bytes { length_from },
        Lowering::Value => {
            let base = schema_type(&declaration.type_info);
            if declaration.array_dimensions.is_empty() {
                base
            } else {
                SchemaType::Sequence(Box::new(base))
            }
        }
    };

    SchemaField {
        name: declaration.name.clone(),
        ty,
    }
}

fn plan_schema(edl: &Edl) -> Schema {
    let mut entries = Vec::new();

    // Enums never reference other entries, so they all come first.
    for developer_type in edl.types_in_order() {
        if developer_type.kind != EdlTypeKind::Struct {
            entries.push(SchemaEntry::Enum(SchemaEnum {
                name: developer_type.name.clone(),
                items: developer_type
                    .items
                    .iter()
                    .map(|item| (item.name.clone(), item.declared_position))
                    .collect(),
            }));
        }
    }

    for developer_type in edl.types_in_order() {
        if developer_type.kind == EdlTypeKind::Struct {
            entries.push(SchemaEntry::Table(SchemaTable {
                name: developer_type.name.clone(),
                fields: developer_type.fields.iter().map(schema_field).collect(),
            }));
        }
    }

    // Parameter containers come last: they may reference any developer type.
    for function in edl.trusted_functions.iter().chain(&edl.untrusted_functions) {
        let (args, result) = function_tables(function);
        entries.push(SchemaEntry::Table(args));
        entries.push(SchemaEntry::Table(result));
    }

    Schema { entries }
}

fn function_tables(function: &Function) -> (SchemaTable, SchemaTable) {
    let in_fields = function
        .parameters
        .iter()
        .filter(|parameter| {
            parameter
                .attribute_info
                .as_ref()
                .map_or(true, |info| info.in_present || !info.out_present)
        })
        .map(schema_field)
        .collect();

    let mut out_fields: Vec<SchemaField> = function
        .parameters
        .iter()
        .filter(|parameter| {
            parameter
                .attribute_info
                .as_ref()
                .map_or(false, |info| info.out_present)
        })
        .map(schema_field)
        .collect();
    if function.returns_value() {
        out_fields.push(schema_field(&function.return_info));
    }

    (
        SchemaTable {
            name: format!("{}_args", function.abi_name),
            fields: in_fields,
        },
        SchemaTable {
            name: format!("{}_result", function.abi_name),
            fields: out_fields,
        },
    )
}

/// Developer types transitively referenced by function parameters and
/// returns, in definition order.
fn referenced_type_names(edl: &Edl) -> Vec<String> {
    let mut referenced = HashSet::new();

    for function in edl.trusted_functions.iter().chain(&edl.untrusted_functions) {
        collect_referenced(edl, &function.return_info.type_info, &mut referenced);
        for parameter in &function.parameters {
            collect_referenced(edl, &parameter.type_info, &mut referenced);
        }
    }

    edl.developer_types_order
        .iter()
        .filter(|name| referenced.contains(*name))
        .cloned()
        .collect()
}

fn collect_referenced(edl: &Edl, type_info: &EdlTypeInfo, referenced: &mut HashSet<String>) {
    match type_info.kind {
        EdlTypeKind::Vector => {
            if let Some(inner) = &type_info.inner {
                collect_referenced(edl, inner, referenced);
            }
        }
        EdlTypeKind::Struct | EdlTypeKind::Enum | EdlTypeKind::AnonymousEnum => {
            if referenced.insert(type_info.name.clone()) {
                if let Some(developer_type) = edl.developer_types.get(&type_info.name) {
                    for field in &developer_type.fields {
                        collect_referenced(edl, &field.type_info, referenced);
                    }
                }
            }
        }
        _ => {}
    }
}
