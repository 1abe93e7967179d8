//! End-to-end parse tests through the public API.

use pretty_assertions::assert_eq;

use edlgen::edl::{self, Edl, EdlTypeKind, RETURN_VALUE_NAME};
use edlgen::files::FileId;
use edlgen::reporting::Message;

fn parse(source: &str) -> Result<Edl, Message> {
    edl::parse(FileId::try_from(1).unwrap(), "sample", source)
}

const SAMPLE: &str = r#"
// A realistic boundary description exercising every feature.
enclave {
    enum { BLOCK = 0x1000, TAG_LEN = 16 };

    enum KeyKind {
        Sealing,
        Signing = 5,
        Ephemeral,
    };

    struct KeyRequest {
        KeyKind kind;
        uint32_t flags;
    };

    struct SealedBlob {
        [size=blob_size] uint8_t* blob;
        uint32_t blob_size;
        uint8_t tag[TAG_LEN];
    };

    struct Envelope {
        SealedBlob sealed;        /* nested pointer-carrying struct */
        vector<uint32_t> offsets;
    };

    trusted {
        HRESULT SealData([in, size=input_size] uint8_t* input, uint32_t input_size,
                         [out] SealedBlob result);
        uint64_t DeriveKey(KeyRequest request);
        void Reset();
    };

    untrusted {
        void LogEvent([in] uint32_t level, [in, count=entry_count] uint64_t* entries,
                      size_t entry_count);
        bool PersistBlob(Envelope envelope, [out] uint32_t written);
    };
};
"#;

#[test]
fn sample_parses_and_preserves_order() {
    let parsed = parse(SAMPLE).unwrap();

    assert_eq!(parsed.name, "sample");
    assert_eq!(
        parsed.developer_types_order,
        vec![
            "_AnonymousEnum_".to_owned(),
            "KeyKind".to_owned(),
            "KeyRequest".to_owned(),
            "SealedBlob".to_owned(),
            "Envelope".to_owned(),
        ],
    );

    let trusted: Vec<(&str, &str)> = parsed
        .trusted_functions
        .iter()
        .map(|function| (function.name.as_str(), function.abi_name.as_str()))
        .collect();
    assert_eq!(
        trusted,
        vec![("SealData", "SealData_0"), ("DeriveKey", "DeriveKey_1"), ("Reset", "Reset_2")],
    );

    let untrusted: Vec<&str> = parsed
        .untrusted_functions
        .iter()
        .map(|function| function.abi_name.as_str())
        .collect();
    assert_eq!(untrusted, vec!["LogEvent_3", "PersistBlob_4"]);
}

#[test]
fn sample_return_invariants_hold() {
    let parsed = parse(SAMPLE).unwrap();

    for function in parsed
        .trusted_functions
        .iter()
        .chain(&parsed.untrusted_functions)
    {
        assert_eq!(function.return_info.name, RETURN_VALUE_NAME);
        assert!(!function.return_info.type_info.is_pointer);
        let info = function.return_info.attribute_info.as_ref().unwrap();
        assert!(info.out_present && !info.in_present);
    }

    assert_eq!(
        parsed.trusted_functions[0].return_info.type_info.kind,
        EdlTypeKind::HResult,
    );
}

#[test]
fn sample_flags_propagate_transitively() {
    let parsed = parse(SAMPLE).unwrap();

    let sealed_blob = &parsed.developer_types["SealedBlob"];
    assert!(sealed_blob.contains_inner_pointer);
    assert!(!sealed_blob.contains_container_type);

    // Envelope only holds a pointer through SealedBlob, and holds a vector
    // directly.
    let envelope = &parsed.developer_types["Envelope"];
    assert!(envelope.contains_inner_pointer);
    assert!(envelope.contains_container_type);

    let key_request = &parsed.developer_types["KeyRequest"];
    assert!(!key_request.contains_inner_pointer);
    assert!(!key_request.contains_container_type);
}

#[test]
fn sample_anonymous_enum_feeds_dimensions_and_sizes() {
    let parsed = parse(SAMPLE).unwrap();

    let anonymous = parsed.anonymous_enum().unwrap();
    assert_eq!(anonymous.item("BLOCK").unwrap().declared_position, 0x1000);
    assert!(anonymous.item("BLOCK").unwrap().is_hex);
    assert_eq!(anonymous.item("TAG_LEN").unwrap().declared_position, 16);
    assert!(!anonymous.item("TAG_LEN").unwrap().is_hex);

    let tag = &parsed.developer_types["SealedBlob"].fields[2];
    assert_eq!(tag.array_dimensions[0].text, "TAG_LEN");
}

#[test]
fn diagnostics_carry_location_and_stable_codes() {
    let source = "enclave {\n    struct S {\n        [size=n] uint32_t x;\n    };\n};";
    let message = parse(source).unwrap_err();

    assert_eq!(message.code(), "EdlSizeAndCountNotValidForNonPointer");
    let diagnostic = message.to_diagnostic();
    assert_eq!(
        diagnostic.code.as_deref(),
        Some("EdlSizeAndCountNotValidForNonPointer"),
    );
    assert!(!diagnostic.labels.is_empty());
}

#[test]
fn the_first_error_aborts_the_file() {
    // Both a forward reference and (later) a duplicate type; only the first
    // is reported.
    let source = "enclave {
        struct A { Missing m; };
        struct B { uint32_t x; };
        struct B { uint32_t y; };
    };";
    let message = parse(source).unwrap_err();
    assert_eq!(message.code(), "EdlDeveloperTypesMustBeDefinedBeforeUse");
}
