//! End-to-end pipeline tests: parse -> plan -> emit through the public API.

use codespan_reporting::term::termcolor::NoColor;
use pretty_assertions::assert_eq;

use edlgen::plan::emit::{Artifact, EmitOptions, ErrorHandlingKind, TrustLayerKind};
use edlgen::Driver;

const SAMPLE: &str = r#"
enclave {
    enum { TAG_LEN = 16 };

    enum KeyKind { Sealing, Signing };

    struct SealedBlob {
        [size=blob_size] uint8_t* blob;
        uint32_t blob_size;
        uint8_t tag[TAG_LEN];
    };

    trusted {
        HRESULT SealData([in, size=input_size] uint8_t* input, uint32_t input_size,
                         [out] SealedBlob result);
        uint64_t DeriveKey(KeyKind kind);
    };

    untrusted {
        void LogEvent([in] uint32_t level, [in, count=entry_count] uint64_t* entries,
                      size_t entry_count);
    };
};
"#;

fn generate(trust_layer: TrustLayerKind, error_handling: ErrorHandlingKind) -> Vec<Artifact> {
    let mut driver = Driver::new();
    driver.set_diagnostic_writer(NoColor::new(std::io::sink()));
    let file_id = driver.load_source_string("vault.edl".to_owned(), SAMPLE.to_owned());

    let options = EmitOptions {
        error_handling,
        trust_layer,
        namespace: "vault".to_owned(),
        outer_class: "VaultClient".to_owned(),
    };
    let (status, artifacts) = driver.generate(file_id, &options);
    assert_eq!(status.exit_code(), 0);
    artifacts
}

fn contents<'a>(artifacts: &'a [Artifact], file_name: &str) -> &'a str {
    &artifacts
        .iter()
        .find(|artifact| artifact.file_name == file_name)
        .unwrap_or_else(|| panic!("missing artifact {}", file_name))
        .contents
}

#[test]
fn both_layers_share_the_schema() {
    let outer = generate(TrustLayerKind::Outer, ErrorHandlingKind::Exception);
    let inner = generate(TrustLayerKind::Inner, ErrorHandlingKind::Exception);

    assert_eq!(
        contents(&outer, "vault_abi.fbs"),
        contents(&inner, "vault_abi.fbs"),
    );
}

#[test]
fn schema_covers_types_and_function_tables() {
    let artifacts = generate(TrustLayerKind::Inner, ErrorHandlingKind::Exception);
    let schema = contents(&artifacts, "vault_abi.fbs");

    for expected in [
        "namespace vault.abi;",
        "enum _AnonymousEnum_ : uint64 {",
        "enum KeyKind : uint64 {",
        "table SealedBlob {",
        "  blob:[ubyte];",
        "  tag:[uint8];",
        "table SealData_0_args {",
        "table SealData_0_result {",
        "table DeriveKey_1_args {",
        "table LogEvent_2_args {",
    ] {
        assert!(schema.contains(expected), "schema missing {:?}", expected);
    }
}

/// Every developer type and function prototype must survive into the types
/// header, so a reader of the generated code sees the same interface the EDL
/// declared.
#[test]
fn types_header_round_trips_the_interface() {
    let artifacts = generate(TrustLayerKind::Inner, ErrorHandlingKind::Exception);
    let header = contents(&artifacts, "vault_types.h");

    for expected in [
        "inline constexpr std::uint64_t TAG_LEN = 16;",
        "enum class KeyKind : std::uint64_t",
        "struct SealedBlob",
        "    std::uint8_t* blob{};",
        "    std::uint8_t tag[TAG_LEN]{};",
        "HRESULT SealData(std::uint8_t* input, std::uint32_t input_size, SealedBlob& result);",
        "std::uint64_t DeriveKey(KeyKind kind);",
        "void LogEvent(std::uint32_t level, std::uint64_t* entries, std::size_t entry_count);",
    ] {
        assert!(header.contains(expected), "header missing {:?}", expected);
    }
}

#[test]
fn inner_side_dispatches_exports_and_stubs() {
    let artifacts = generate(TrustLayerKind::Inner, ErrorHandlingKind::Exception);
    let abi = contents(&artifacts, "vault_inner_abi.h");
    let exports = contents(&artifacts, "vault_inner_exports.cpp");

    assert!(abi.contains("inline void* SealData_0_dispatch(void* context)"));
    assert!(abi.contains("inline void* DeriveKey_1_dispatch(void* context)"));
    assert!(abi.contains("inline void LogEvent(std::uint32_t level, std::uint64_t* entries, std::size_t entry_count)"));
    assert!(abi.contains("edlrt::call_outer(\"LogEvent_2\", inputs, outputs)"));
    assert!(abi.contains(
        "edlrt::pack_buffer(inputs.entries, entries, entry_count * sizeof(std::uint64_t));"
    ));

    assert!(exports.contains("extern \"C\" void* SealData_0(void* context)"));
    assert!(exports.contains("extern \"C\" void* DeriveKey_1(void* context)"));
}

#[test]
fn outer_side_stubs_and_address_table() {
    let artifacts = generate(TrustLayerKind::Outer, ErrorHandlingKind::Exception);
    let abi = contents(&artifacts, "vault_outer_abi.h");

    assert!(abi.contains("inline HRESULT VaultClient::SealData("));
    assert!(abi.contains("edlrt::call_inner(m_inner_instance, \"SealData_0\", inputs, outputs)"));
    assert!(abi.contains("    edlrt::copy_out(result, outputs.result);"));
    assert!(abi.contains("inline void* LogEvent_2_dispatch(void* context)"));
    assert!(abi.contains("inline constexpr edlrt::address_table_entry vault_address_table[] = {"));
    assert!(abi.contains("    { \"outer_alloc\", &edlrt::outer_alloc },"));
    assert!(abi.contains("    { \"LogEvent_2\", &LogEvent_2_dispatch },"));
}

#[test]
fn error_code_mode_rewrites_stub_signatures_only() {
    let exception = generate(TrustLayerKind::Outer, ErrorHandlingKind::Exception);
    let error_code = generate(TrustLayerKind::Outer, ErrorHandlingKind::ErrorCode);

    // The schema is unaffected by the error-handling mode.
    assert_eq!(
        contents(&exception, "vault_abi.fbs"),
        contents(&error_code, "vault_abi.fbs"),
    );

    let header = contents(&error_code, "vault_types.h");
    assert!(header.contains("edlrt::status SealData("));
    assert!(header.contains("HRESULT* _return_value_);"));

    let abi = contents(&error_code, "vault_outer_abi.h");
    assert!(abi.contains("    const auto boundary_status = edlrt::call_inner(m_inner_instance, \"SealData_0\", inputs, outputs);"));
    assert!(abi.contains("    return edlrt::status_ok;"));
}

#[test]
fn generation_is_deterministic() {
    let first = generate(TrustLayerKind::Inner, ErrorHandlingKind::Exception);
    let second = generate(TrustLayerKind::Inner, ErrorHandlingKind::Exception);
    assert_eq!(first, second);
}
