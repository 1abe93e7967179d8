//! Renders a [`Plan`] into textual artifacts.
//!
//! Emission is a pure function of the plan and the [`EmitOptions`]: the same
//! inputs always produce byte-identical artifacts. The generated C++ calls
//! into a small runtime (`edlrt::*`) of marshaling helpers templated over the
//! schema-compiler output; this module produces their call sites and the
//! surrounding declarations, never their implementations.

use std::fmt::Write;

use itertools::Itertools;

use crate::plan::{
    CallDirection, EnumPlan, FunctionPlan, Lowering, ParamPlan, Plan, SchemaEntry, SchemaType,
    StructPlan, TypePlan,
};

/// Whether generated stubs report transport failures by return value or by
/// throwing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorHandlingKind {
    ErrorCode,
    Exception,
}

impl std::str::FromStr for ErrorHandlingKind {
    type Err = &'static str;

    fn from_str(src: &str) -> Result<ErrorHandlingKind, &'static str> {
        match src {
            "error-code" => Ok(ErrorHandlingKind::ErrorCode),
            "exception" => Ok(ErrorHandlingKind::Exception),
            _ => Err("expected `error-code` or `exception`"),
        }
    }
}

/// Which side's artifacts to produce.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrustLayerKind {
    Outer,
    Inner,
}

impl std::str::FromStr for TrustLayerKind {
    type Err = &'static str;

    fn from_str(src: &str) -> Result<TrustLayerKind, &'static str> {
        match src {
            "outer" => Ok(TrustLayerKind::Outer),
            "inner" => Ok(TrustLayerKind::Inner),
            _ => Err("expected `outer` or `inner`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub error_handling: ErrorHandlingKind,
    pub trust_layer: TrustLayerKind,
    /// Namespace qualifier applied to all emitted names.
    pub namespace: String,
    /// Name of the class grouping the outer-side entry points.
    pub outer_class: String,
}

/// A generated file, ready for an external writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

/// Render every artifact for the configured trust layer. The ABI schema is
/// produced for both layers; it feeds the external schema compiler.
pub fn emit(plan: &Plan, options: &EmitOptions) -> Vec<Artifact> {
    let mut artifacts = vec![emit_schema(plan, options), emit_types_header(plan, options)];

    match options.trust_layer {
        TrustLayerKind::Outer => artifacts.push(emit_outer_abi(plan, options)),
        TrustLayerKind::Inner => {
            artifacts.push(emit_inner_abi(plan, options));
            artifacts.push(emit_inner_exports(plan, options));
        }
    }

    artifacts
}

fn banner(plan: &Plan) -> String {
    format!(
        "// Generated by edlgen from {}.edl. Do not edit.\n",
        plan.name
    )
}

// ---------------------------------------------------------------------------
// ABI schema
// ---------------------------------------------------------------------------

fn schema_type_name(ty: &SchemaType) -> String {
    match ty {
        SchemaType::Scalar(name) => (*name).to_owned(),
        SchemaType::Named(name) => name.clone(),
        SchemaType::Bytes { .. } => "[ubyte]".to_owned(),
        SchemaType::Sequence(inner) => format!("[{}]", schema_type_name(inner)),
    }
}

fn emit_schema(plan: &Plan, options: &EmitOptions) -> Artifact {
    let mut out = banner(plan);
    writeln!(out).unwrap();
    writeln!(out, "namespace {}.abi;", options.namespace).unwrap();

    for entry in &plan.schema.entries {
        writeln!(out).unwrap();
        match entry {
            SchemaEntry::Enum(schema_enum) => {
                writeln!(out, "enum {} : uint64 {{", schema_enum.name).unwrap();
                for (name, value) in &schema_enum.items {
                    writeln!(out, "  {} = {},", name, value).unwrap();
                }
                writeln!(out, "}}").unwrap();
            }
            SchemaEntry::Table(table) => {
                writeln!(out, "table {} {{", table.name).unwrap();
                for field in &table.fields {
                    writeln!(out, "  {}:{};", field.name, schema_type_name(&field.ty)).unwrap();
                }
                writeln!(out, "}}").unwrap();
            }
        }
    }

    Artifact {
        file_name: format!("{}_abi.fbs", plan.name),
        contents: out,
    }
}

// ---------------------------------------------------------------------------
// Types header
// ---------------------------------------------------------------------------

fn hex_or_decimal(value: u64, hex: bool) -> String {
    if hex {
        format!("0x{:X}", value)
    } else {
        value.to_string()
    }
}

fn emit_enum(out: &mut String, enum_plan: &EnumPlan) {
    if enum_plan.anonymous {
        // Anonymous enum items are file-scope constants; they also name
        // array dimensions and size/count values.
        for item in &enum_plan.items {
            writeln!(
                out,
                "inline constexpr std::uint64_t {} = {};",
                item.name,
                hex_or_decimal(item.value, item.hex),
            )
            .unwrap();
        }
        return;
    }

    writeln!(out, "enum class {} : std::uint64_t", enum_plan.name).unwrap();
    writeln!(out, "{{").unwrap();
    for item in &enum_plan.items {
        writeln!(
            out,
            "    {} = {},",
            item.name,
            hex_or_decimal(item.value, item.hex),
        )
        .unwrap();
    }
    writeln!(out, "}};").unwrap();
}

fn emit_struct(out: &mut String, struct_plan: &StructPlan) {
    writeln!(out, "struct {}", struct_plan.name).unwrap();
    writeln!(out, "{{").unwrap();
    for field in &struct_plan.fields {
        match &field.array_dimension {
            Some(dimension) => {
                writeln!(out, "    {} {}[{}]{{}};", field.cpp_type, field.name, dimension).unwrap()
            }
            None => writeln!(out, "    {} {}{{}};", field.cpp_type, field.name).unwrap(),
        }
    }
    writeln!(out, "}};").unwrap();
}

/// Render one parameter of a developer-facing signature.
fn render_parameter(parameter: &ParamPlan) -> String {
    if let Some(dimension) = &parameter.array_dimension {
        return format!("{} {}[{}]", parameter.cpp_type, parameter.name, dimension);
    }
    if parameter.is_pointer {
        format!("{} {}", parameter.cpp_type, parameter.name)
    } else if parameter.direction.includes_out() {
        format!("{}& {}", parameter.cpp_type, parameter.name)
    } else if parameter.is_struct || parameter.is_container {
        format!("const {}& {}", parameter.cpp_type, parameter.name)
    } else {
        format!("{} {}", parameter.cpp_type, parameter.name)
    }
}

/// The natural signature the developer implements and calls: transport
/// failures are not part of it.
fn impl_signature(function: &FunctionPlan) -> String {
    format!(
        "{} {}({})",
        function.return_type,
        function.name,
        function.parameters.iter().map(render_parameter).join(", "),
    )
}

/// The signature of a generated stub, shaped by the error-handling mode:
/// `ErrorCode` stubs return `edlrt::status` and move the declared return to
/// a trailing out parameter.
fn stub_signature(
    function: &FunctionPlan,
    options: &EmitOptions,
    class_prefix: &str,
) -> String {
    let mut parameters = function.parameters.iter().map(render_parameter);

    match options.error_handling {
        ErrorHandlingKind::Exception => format!(
            "{} {}{}({})",
            function.return_type,
            class_prefix,
            function.name,
            parameters.join(", "),
        ),
        ErrorHandlingKind::ErrorCode => {
            let mut parameters: Vec<String> = parameters.collect();
            if function.returns_value {
                parameters.push(format!("{}* _return_value_", function.return_type));
            }
            format!(
                "edlrt::status {}{}({})",
                class_prefix,
                function.name,
                parameters.join(", "),
            )
        }
    }
}

fn emit_types_header(plan: &Plan, options: &EmitOptions) -> Artifact {
    let mut out = banner(plan);
    let namespace = &options.namespace;

    writeln!(out).unwrap();
    writeln!(out, "#pragma once").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "#include <cstddef>").unwrap();
    writeln!(out, "#include <cstdint>").unwrap();
    writeln!(out, "#include <vector>").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "#include <edl_runtime/types.h>").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "namespace {}", namespace).unwrap();
    writeln!(out, "{{").unwrap();

    for type_plan in &plan.types {
        writeln!(out).unwrap();
        match type_plan {
            TypePlan::Enum(enum_plan) => emit_enum(&mut out, enum_plan),
            TypePlan::Struct(struct_plan) => emit_struct(&mut out, struct_plan),
        }
    }

    match options.trust_layer {
        TrustLayerKind::Outer => {
            writeln!(out).unwrap();
            writeln!(out, "// Developer-callable entry points into the inner side.").unwrap();
            writeln!(out, "class {}", options.outer_class).unwrap();
            writeln!(out, "{{").unwrap();
            writeln!(out, "public:").unwrap();
            writeln!(
                out,
                "    explicit {}(void* inner_instance) : m_inner_instance(inner_instance) {{}}",
                options.outer_class,
            )
            .unwrap();
            writeln!(out).unwrap();
            for function in &plan.host_to_enclave {
                writeln!(out, "    {};", stub_signature(function, options, "")).unwrap();
            }
            writeln!(out).unwrap();
            writeln!(out, "private:").unwrap();
            writeln!(out, "    void* m_inner_instance{{}};").unwrap();
            writeln!(out, "}};").unwrap();

            if !plan.enclave_to_host.is_empty() {
                writeln!(out).unwrap();
                writeln!(out, "// Implemented by the outer application; invoked from the inner side.").unwrap();
                for function in &plan.enclave_to_host {
                    writeln!(out, "{};", impl_signature(function)).unwrap();
                }
            }
        }
        TrustLayerKind::Inner => {
            if !plan.host_to_enclave.is_empty() {
                writeln!(out).unwrap();
                writeln!(out, "// Implemented by the inner application; invoked from the outer side.").unwrap();
                for function in &plan.host_to_enclave {
                    writeln!(out, "{};", impl_signature(function)).unwrap();
                }
            }

            if !plan.enclave_to_host.is_empty() {
                writeln!(out).unwrap();
                writeln!(out, "// Developer-callable stubs that invoke outer callbacks.").unwrap();
                for function in &plan.enclave_to_host {
                    writeln!(out, "{};", stub_signature(function, options, "")).unwrap();
                }
            }
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "}} // namespace {}", namespace).unwrap();

    Artifact {
        file_name: format!("{}_types.h", plan.name),
        contents: out,
    }
}

// ---------------------------------------------------------------------------
// Stub and dispatcher bodies
// ---------------------------------------------------------------------------

/// The byte-length expression governing a buffer parameter, evaluated in stub
/// scope (parameter bindings, anonymous enum constants and literals are all
/// in scope by name).
fn stub_length_expr(parameter: &ParamPlan) -> String {
    match &parameter.lowering {
        Lowering::Buffer {
            length_from,
            length_is_count: true,
        } => format!("{} * sizeof({})", length_from, parameter.element_type()),
        Lowering::Buffer { length_from, .. } => length_from.clone(),
        Lowering::Value => String::new(),
    }
}

/// The same expression in dispatcher scope, where sibling parameters are
/// fields of the unpacked input table.
fn dispatch_length_expr(function: &FunctionPlan, parameter: &ParamPlan) -> String {
    match &parameter.lowering {
        Lowering::Buffer {
            length_from,
            length_is_count,
        } => {
            let base = if function
                .parameters
                .iter()
                .any(|sibling| sibling.name == *length_from)
            {
                format!("inputs.{}", length_from)
            } else {
                length_from.clone()
            };
            if *length_is_count {
                format!("{} * sizeof({})", base, parameter.element_type())
            } else {
                base
            }
        }
        Lowering::Value => String::new(),
    }
}

/// Lines that pack one stub argument into the input table.
fn emit_stub_pack(out: &mut String, parameter: &ParamPlan) {
    match (&parameter.lowering, &parameter.array_dimension) {
        (Lowering::Buffer { .. }, _) => writeln!(
            out,
            "    edlrt::pack_buffer(inputs.{}, {}, {});",
            parameter.name,
            parameter.name,
            stub_length_expr(parameter),
        )
        .unwrap(),
        (Lowering::Value, Some(dimension)) => writeln!(
            out,
            "    inputs.{}.assign({}, {} + {});",
            parameter.name, parameter.name, parameter.name, dimension,
        )
        .unwrap(),
        (Lowering::Value, None) => writeln!(
            out,
            "    inputs.{} = edlrt::pack({});",
            parameter.name, parameter.name,
        )
        .unwrap(),
    }
}

/// The body of a developer-callable stub: pack the inputs, cross the
/// boundary, copy the out-direction values back to the caller's bindings.
fn emit_stub(out: &mut String, function: &FunctionPlan, options: &EmitOptions, class_prefix: &str) {
    let namespace = &options.namespace;
    writeln!(
        out,
        "inline {}",
        stub_signature(function, options, class_prefix),
    )
    .unwrap();
    writeln!(out, "{{").unwrap();
    writeln!(
        out,
        "    {}::abi::{} inputs{{}};",
        namespace, function.input_table,
    )
    .unwrap();
    for parameter in function.in_params() {
        emit_stub_pack(out, parameter);
    }
    writeln!(
        out,
        "    {}::abi::{} outputs{{}};",
        namespace, function.output_table,
    )
    .unwrap();

    let transport = match function.direction {
        CallDirection::HostToEnclave => format!(
            "edlrt::call_inner(m_inner_instance, \"{}\", inputs, outputs)",
            function.abi_name,
        ),
        CallDirection::EnclaveToHost => format!(
            "edlrt::call_outer(\"{}\", inputs, outputs)",
            function.abi_name,
        ),
    };

    match options.error_handling {
        ErrorHandlingKind::Exception => {
            writeln!(out, "    edlrt::throw_if_failed({});", transport).unwrap();
        }
        ErrorHandlingKind::ErrorCode => {
            // `boundary_status` rather than `status`: a parameter may be
            // named `status`.
            writeln!(out, "    const auto boundary_status = {};", transport).unwrap();
            writeln!(out, "    if (boundary_status != edlrt::status_ok)").unwrap();
            writeln!(out, "    {{").unwrap();
            writeln!(out, "        return boundary_status;").unwrap();
            writeln!(out, "    }}").unwrap();
        }
    }

    for parameter in function.out_params() {
        writeln!(
            out,
            "    edlrt::copy_out({}, outputs.{});",
            parameter.name, parameter.name,
        )
        .unwrap();
    }

    match (options.error_handling, function.returns_value) {
        (ErrorHandlingKind::Exception, true) => writeln!(
            out,
            "    return edlrt::unpack<{}>(outputs._return_value_);",
            function.return_type,
        )
        .unwrap(),
        (ErrorHandlingKind::Exception, false) => {}
        (ErrorHandlingKind::ErrorCode, true) => {
            writeln!(
                out,
                "    *_return_value_ = edlrt::unpack<{}>(outputs._return_value_);",
                function.return_type,
            )
            .unwrap();
            writeln!(out, "    return edlrt::status_ok;").unwrap();
        }
        (ErrorHandlingKind::ErrorCode, false) => {
            writeln!(out, "    return edlrt::status_ok;").unwrap();
        }
    }

    writeln!(out, "}}").unwrap();
}

/// The argument expression forwarding one unpacked parameter to the
/// developer implementation.
fn dispatch_argument(parameter: &ParamPlan) -> String {
    let container = if parameter.direction.includes_out() {
        "outputs"
    } else {
        "inputs"
    };

    match (&parameter.lowering, &parameter.array_dimension) {
        (Lowering::Buffer { .. }, _) => format!(
            "edlrt::buffer_arg<{}>({}.{})",
            parameter.cpp_type, container, parameter.name,
        ),
        (Lowering::Value, Some(_)) => format!(
            "edlrt::buffer_arg<{}*>({}.{})",
            parameter.cpp_type, container, parameter.name,
        ),
        (Lowering::Value, None) if parameter.direction.includes_out() => format!(
            "edlrt::out_arg<{}>(outputs.{})",
            parameter.cpp_type, parameter.name,
        ),
        (Lowering::Value, None) => format!(
            "edlrt::unpack<{}>(inputs.{})",
            parameter.cpp_type, parameter.name,
        ),
    }
}

/// The body of an ABI dispatcher: unpack the forwarded parameters, call the
/// developer implementation, pack the returned parameters.
fn emit_dispatcher(out: &mut String, function: &FunctionPlan, options: &EmitOptions) {
    let namespace = &options.namespace;

    writeln!(
        out,
        "inline void* {}_dispatch(void* context)",
        function.abi_name,
    )
    .unwrap();
    writeln!(out, "{{").unwrap();
    writeln!(
        out,
        "    return edlrt::dispatch<{}::abi::{}, {}::abi::{}>(context,",
        namespace, function.input_table, namespace, function.output_table,
    )
    .unwrap();
    writeln!(
        out,
        "        [](const {}::abi::{}& inputs, {}::abi::{}& outputs)",
        namespace, function.input_table, namespace, function.output_table,
    )
    .unwrap();
    writeln!(out, "        {{").unwrap();

    // Out-direction payloads live in the output table; seed them from the
    // inputs (in+out), give buffers their governed capacity (out only), and
    // leave out-only scalars default-initialised.
    for parameter in function.out_params() {
        let is_sequence = matches!(parameter.lowering, Lowering::Buffer { .. })
            || parameter.array_dimension.is_some();
        if parameter.direction.includes_in() {
            writeln!(
                out,
                "            outputs.{} = inputs.{};",
                parameter.name, parameter.name,
            )
            .unwrap();
        } else if is_sequence {
            let capacity = match &parameter.array_dimension {
                Some(dimension) => dimension.clone(),
                None => dispatch_length_expr(function, parameter),
            };
            writeln!(
                out,
                "            edlrt::resize_buffer(outputs.{}, {});",
                parameter.name, capacity,
            )
            .unwrap();
        }
    }

    let arguments = function
        .parameters
        .iter()
        .map(dispatch_argument)
        .join(",\n                ");
    let call = if function.parameters.is_empty() {
        format!("{}::{}()", namespace, function.name)
    } else {
        format!(
            "{}::{}(\n                {})",
            namespace, function.name, arguments,
        )
    };

    if function.returns_value {
        writeln!(out, "            outputs._return_value_ = edlrt::pack({});", call).unwrap();
    } else {
        writeln!(out, "            {};", call).unwrap();
    }

    writeln!(out, "        }});").unwrap();
    writeln!(out, "}}").unwrap();
}

// ---------------------------------------------------------------------------
// Per-side ABI headers and the export table
// ---------------------------------------------------------------------------

fn emit_outer_abi(plan: &Plan, options: &EmitOptions) -> Artifact {
    let namespace = &options.namespace;
    let mut out = banner(plan);

    writeln!(out).unwrap();
    writeln!(out, "#pragma once").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "#include \"{}_types.h\"", plan.name).unwrap();
    writeln!(out, "#include \"{}_abi_generated.h\"", plan.name).unwrap();
    writeln!(out).unwrap();
    writeln!(out, "#include <edl_runtime/outer.h>").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "namespace {}", namespace).unwrap();
    writeln!(out, "{{").unwrap();

    if !plan.enclave_to_host.is_empty() {
        writeln!(out).unwrap();
        writeln!(out, "// Dispatchers for callbacks arriving from the inner side.").unwrap();
        for function in &plan.enclave_to_host {
            writeln!(out).unwrap();
            emit_dispatcher(&mut out, function, options);
        }
    }

    // Name-based lookup table: the inner side resolves dispatchers and the
    // allocation callbacks through it.
    writeln!(out).unwrap();
    writeln!(
        out,
        "inline constexpr edlrt::address_table_entry {}_address_table[] = {{",
        plan.name,
    )
    .unwrap();
    for entry in &plan.address_table {
        writeln!(out, "    {{ \"{}\", &{} }},", entry.abi_name, entry.symbol).unwrap();
    }
    writeln!(out, "}};").unwrap();

    if !plan.host_to_enclave.is_empty() {
        writeln!(out).unwrap();
        writeln!(out, "// Stubs crossing into the inner side.").unwrap();
        for function in &plan.host_to_enclave {
            writeln!(out).unwrap();
            emit_stub(
                &mut out,
                function,
                options,
                &format!("{}::", options.outer_class),
            );
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "}} // namespace {}", namespace).unwrap();

    Artifact {
        file_name: format!("{}_outer_abi.h", plan.name),
        contents: out,
    }
}

fn emit_inner_abi(plan: &Plan, options: &EmitOptions) -> Artifact {
    let namespace = &options.namespace;
    let mut out = banner(plan);

    writeln!(out).unwrap();
    writeln!(out, "#pragma once").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "#include \"{}_types.h\"", plan.name).unwrap();
    writeln!(out, "#include \"{}_abi_generated.h\"", plan.name).unwrap();
    writeln!(out).unwrap();
    writeln!(out, "#include <edl_runtime/inner.h>").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "namespace {}", namespace).unwrap();
    writeln!(out, "{{").unwrap();

    if !plan.host_to_enclave.is_empty() {
        writeln!(out).unwrap();
        writeln!(out, "// Dispatchers for calls arriving from the outer side.").unwrap();
        for function in &plan.host_to_enclave {
            writeln!(out).unwrap();
            emit_dispatcher(&mut out, function, options);
        }
    }

    if !plan.enclave_to_host.is_empty() {
        writeln!(out).unwrap();
        writeln!(out, "// Stubs crossing out to the outer side.").unwrap();
        for function in &plan.enclave_to_host {
            writeln!(out).unwrap();
            emit_stub(&mut out, function, options, "");
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "}} // namespace {}", namespace).unwrap();

    Artifact {
        file_name: format!("{}_inner_abi.h", plan.name),
        contents: out,
    }
}

fn emit_inner_exports(plan: &Plan, options: &EmitOptions) -> Artifact {
    let namespace = &options.namespace;
    let mut out = banner(plan);

    writeln!(out).unwrap();
    writeln!(out, "#include \"{}_inner_abi.h\"", plan.name).unwrap();

    for entry in &plan.exports {
        writeln!(out).unwrap();
        writeln!(out, "extern \"C\" void* {}(void* context)", entry.symbol).unwrap();
        writeln!(out, "{{").unwrap();
        writeln!(out, "    return {}::{}(context);", namespace, entry.dispatcher).unwrap();
        writeln!(out, "}}").unwrap();
    }

    Artifact {
        file_name: format!("{}_inner_exports.cpp", plan.name),
        contents: out,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::edl;
    use crate::files::FileId;
    use crate::pass::edl_to_plan;

    const SAMPLE: &str = "enclave {
        enum { MAX = 8 };
        enum Level { Low, High = 0x10 };
        struct Payload { [size=n] uint8_t* data; uint32_t n; Level level; };
        trusted {
            uint32_t Send([in, size=len] uint8_t* buf, uint32_t len, Payload payload);
            void Ping();
        };
        untrusted {
            void Notify([in] Level level, [out] uint32_t status);
        };
    };";

    fn sample_plan() -> Plan {
        let edl = edl::parse(FileId::try_from(1).unwrap(), "sample", SAMPLE).unwrap();
        edl_to_plan::plan(&edl)
    }

    fn options(trust_layer: TrustLayerKind, error_handling: ErrorHandlingKind) -> EmitOptions {
        EmitOptions {
            error_handling,
            trust_layer,
            namespace: "sample".to_owned(),
            outer_class: "SampleClient".to_owned(),
        }
    }

    fn artifact<'a>(artifacts: &'a [Artifact], file_name: &str) -> &'a Artifact {
        artifacts
            .iter()
            .find(|artifact| artifact.file_name == file_name)
            .unwrap_or_else(|| panic!("missing artifact {}", file_name))
    }

    #[test]
    fn outer_layer_artifact_set() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Outer, ErrorHandlingKind::Exception),
        );
        let names: Vec<&str> = artifacts
            .iter()
            .map(|artifact| artifact.file_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["sample_abi.fbs", "sample_types.h", "sample_outer_abi.h"],
        );
    }

    #[test]
    fn inner_layer_artifact_set() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Inner, ErrorHandlingKind::Exception),
        );
        let names: Vec<&str> = artifacts
            .iter()
            .map(|artifact| artifact.file_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "sample_abi.fbs",
                "sample_types.h",
                "sample_inner_abi.h",
                "sample_inner_exports.cpp",
            ],
        );
    }

    #[test]
    fn schema_lowers_pointers_to_byte_buffers() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Outer, ErrorHandlingKind::Exception),
        );
        let schema = &artifact(&artifacts, "sample_abi.fbs").contents;

        assert!(schema.contains("namespace sample.abi;"));
        assert!(schema.contains("enum Level : uint64 {"));
        assert!(schema.contains("  High = 16,"));
        assert!(schema.contains("table Payload {"));
        assert!(schema.contains("  data:[ubyte];"));
        assert!(schema.contains("  level:Level;"));
        assert!(schema.contains("table Send_0_args {"));
        assert!(schema.contains("table Send_0_result {"));
        assert!(schema.contains("  _return_value_:uint32;"));
    }

    #[test]
    fn types_header_renders_enums_structs_and_prototypes() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Outer, ErrorHandlingKind::Exception),
        );
        let header = &artifact(&artifacts, "sample_types.h").contents;

        assert!(header.contains("namespace sample"));
        assert!(header.contains("inline constexpr std::uint64_t MAX = 8;"));
        assert!(header.contains("enum class Level : std::uint64_t"));
        assert!(header.contains("    High = 0x10,"));
        assert!(header.contains("struct Payload"));
        assert!(header.contains("    std::uint8_t* data{};"));
        assert!(header.contains("class SampleClient"));
        assert!(header.contains(
            "    std::uint32_t Send(std::uint8_t* buf, std::uint32_t len, const Payload& payload);"
        ));
        assert!(header.contains("    void Ping();"));
        // Outer implementation declaration for the callback.
        assert!(header.contains("void Notify(Level level, std::uint32_t& status);"));
    }

    #[test]
    fn inner_types_header_swaps_roles() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Inner, ErrorHandlingKind::Exception),
        );
        let header = &artifact(&artifacts, "sample_types.h").contents;

        assert!(!header.contains("class SampleClient"));
        assert!(header.contains(
            "std::uint32_t Send(std::uint8_t* buf, std::uint32_t len, const Payload& payload);"
        ));
        assert!(header.contains("void Notify(Level level, std::uint32_t& status);"));
    }

    #[test]
    fn outer_stub_packs_calls_and_copies_back() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Outer, ErrorHandlingKind::Exception),
        );
        let header = &artifact(&artifacts, "sample_outer_abi.h").contents;

        assert!(header.contains("inline std::uint32_t SampleClient::Send("));
        assert!(header.contains("    sample::abi::Send_0_args inputs{};"));
        assert!(header.contains("    edlrt::pack_buffer(inputs.buf, buf, len);"));
        assert!(header.contains("    inputs.len = edlrt::pack(len);"));
        assert!(header.contains("    inputs.payload = edlrt::pack(payload);"));
        assert!(header.contains(
            "    edlrt::throw_if_failed(edlrt::call_inner(m_inner_instance, \"Send_0\", inputs, outputs));"
        ));
        assert!(header.contains("    return edlrt::unpack<std::uint32_t>(outputs._return_value_);"));
    }

    #[test]
    fn error_code_stubs_return_status() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Outer, ErrorHandlingKind::ErrorCode),
        );
        let header = &artifact(&artifacts, "sample_outer_abi.h").contents;

        assert!(header.contains("inline edlrt::status SampleClient::Send("));
        assert!(header.contains("std::uint32_t* _return_value_)"));
        assert!(header.contains("    if (boundary_status != edlrt::status_ok)"));
        assert!(header.contains("    *_return_value_ = edlrt::unpack<std::uint32_t>(outputs._return_value_);"));
    }

    #[test]
    fn outer_dispatchers_and_address_table() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Outer, ErrorHandlingKind::Exception),
        );
        let header = &artifact(&artifacts, "sample_outer_abi.h").contents;

        assert!(header.contains("inline void* Notify_2_dispatch(void* context)"));
        assert!(header.contains("edlrt::dispatch<sample::abi::Notify_2_args, sample::abi::Notify_2_result>"));
        assert!(header.contains("sample::Notify("));
        assert!(header.contains("edlrt::out_arg<std::uint32_t>(outputs.status)"));

        assert!(header.contains("inline constexpr edlrt::address_table_entry sample_address_table[] = {"));
        assert!(header.contains("    { \"outer_alloc\", &edlrt::outer_alloc },"));
        assert!(header.contains("    { \"outer_dealloc\", &edlrt::outer_dealloc },"));
        assert!(header.contains("    { \"Notify_2\", &Notify_2_dispatch },"));
    }

    #[test]
    fn inner_abi_dispatches_trusted_and_stubs_untrusted() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Inner, ErrorHandlingKind::Exception),
        );
        let header = &artifact(&artifacts, "sample_inner_abi.h").contents;

        assert!(header.contains("inline void* Send_0_dispatch(void* context)"));
        assert!(header.contains("edlrt::buffer_arg<std::uint8_t*>(inputs.buf)"));
        assert!(header.contains("outputs._return_value_ = edlrt::pack(sample::Send("));

        assert!(header.contains("inline void Notify(Level level, std::uint32_t& status)"));
        assert!(header.contains("edlrt::call_outer(\"Notify_2\", inputs, outputs)"));
        assert!(header.contains("    edlrt::copy_out(status, outputs.status);"));
    }

    #[test]
    fn inner_exports_forward_to_dispatchers() {
        let artifacts = emit(
            &sample_plan(),
            &options(TrustLayerKind::Inner, ErrorHandlingKind::Exception),
        );
        let exports = &artifact(&artifacts, "sample_inner_exports.cpp").contents;

        assert!(exports.contains("#include \"sample_inner_abi.h\""));
        assert!(exports.contains("extern \"C\" void* Send_0(void* context)"));
        assert!(exports.contains("    return sample::Send_0_dispatch(context);"));
        assert!(exports.contains("extern \"C\" void* Ping_1(void* context)"));
        assert!(!exports.contains("Notify_2(void* context)"));
    }

    #[test]
    fn count_attributes_scale_by_element_size() {
        let source = "enclave { trusted { void F([in, count=c] uint64_t* items, uint32_t c); }; };";
        let edl = edl::parse(FileId::try_from(1).unwrap(), "sample", source).unwrap();
        let plan = edl_to_plan::plan(&edl);
        let artifacts = emit(&plan, &options(TrustLayerKind::Outer, ErrorHandlingKind::Exception));
        let header = &artifact(&artifacts, "sample_outer_abi.h").contents;

        assert!(header.contains(
            "    edlrt::pack_buffer(inputs.items, items, c * sizeof(std::uint64_t));"
        ));
    }

    #[test]
    fn out_buffers_are_seeded_or_sized_in_dispatchers() {
        let source = "enclave {
            trusted {
                void F([in, out, size=n] uint8_t* shared, [out, size=n] uint8_t* sink, uint32_t n);
            };
        };";
        let edl = edl::parse(FileId::try_from(1).unwrap(), "sample", source).unwrap();
        let plan = edl_to_plan::plan(&edl);
        let artifacts = emit(&plan, &options(TrustLayerKind::Inner, ErrorHandlingKind::Exception));
        let header = &artifact(&artifacts, "sample_inner_abi.h").contents;

        assert!(header.contains("            outputs.shared = inputs.shared;"));
        assert!(header.contains("            edlrt::resize_buffer(outputs.sink, inputs.n);"));
        assert!(header.contains("edlrt::buffer_arg<std::uint8_t*>(outputs.shared)"));
        assert!(header.contains("edlrt::buffer_arg<std::uint8_t*>(outputs.sink)"));
    }

    #[test]
    fn emission_is_deterministic() {
        let first = emit(
            &sample_plan(),
            &options(TrustLayerKind::Inner, ErrorHandlingKind::ErrorCode),
        );
        let second = emit(
            &sample_plan(),
            &options(TrustLayerKind::Inner, ErrorHandlingKind::ErrorCode),
        );
        assert_eq!(first, second);
    }
}
