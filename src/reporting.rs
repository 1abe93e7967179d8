//! Diagnostic messages used in the EDL compiler.
//!
//! Every lexical or semantic fault is a [`Message`], carrying the file id,
//! the byte range of the offending tokens and the arguments needed to
//! render it. Messages convert to [`Diagnostic`]s for presentation; the
//! diagnostic code is the stable, user-visible error id (`Edl*`).
//!
//! Analysis is fail-fast: parser functions return `Result<_, Message>` and
//! the first message aborts the file, so callers only ever see one.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use std::ops::Range;

use crate::files::FileId;

#[derive(Debug, Clone)]
pub enum Message {
    // Lexer faults. These have no dedicated error ids in the taxonomy and
    // all render under `EdlUnexpectedToken`.
    UnexpectedCharacter {
        file_id: FileId,
        range: Range<usize>,
        found: char,
    },
    UnterminatedComment {
        file_id: FileId,
        range: Range<usize>,
    },
    MalformedIntegerLiteral {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },

    // Parser faults.
    ExpectedTokenNotFound {
        file_id: FileId,
        range: Range<usize>,
        expected: String,
        found: String,
    },
    UnexpectedToken {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    DuplicateTypeDefinition {
        file_id: FileId,
        range: Range<usize>,
        name: String,
    },
    TypeNameIdentifierIsReserved {
        file_id: FileId,
        range: Range<usize>,
        name: String,
    },
    DuplicateFieldOrParameter {
        file_id: FileId,
        range: Range<usize>,
        name: String,
        parent: String,
    },
    DuplicateFunctionDeclaration {
        file_id: FileId,
        range: Range<usize>,
        name: String,
    },
    EnumNameIdentifierNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    EnumValueIdentifierNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    EnumValueNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    EnumNameDuplicated {
        file_id: FileId,
        range: Range<usize>,
        name: String,
    },
    StructIdentifierNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    FunctionIdentifierNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    IdentifierNameNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    ReturnValuesCannotBePointers {
        file_id: FileId,
        range: Range<usize>,
        function: String,
    },
    InvalidAttribute {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    NonSizeOrCountAttributeInStruct {
        file_id: FileId,
        range: Range<usize>,
    },
    DuplicateAttributeFound {
        file_id: FileId,
        range: Range<usize>,
    },
    SizeOrCountValueInvalid {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    SizeAndCountNotValidForNonPointer {
        file_id: FileId,
        range: Range<usize>,
        type_name: String,
    },
    SizeOrCountAttributeNotFound {
        file_id: FileId,
        range: Range<usize>,
        name: String,
        parent: String,
    },
    SizeOrCountForArrayNotValid {
        file_id: FileId,
        range: Range<usize>,
        parent: String,
    },
    SizeOrCountInvalidType {
        file_id: FileId,
        range: Range<usize>,
        type_name: String,
        parent: String,
    },
    DeveloperTypesMustBeDefinedBeforeUse {
        file_id: FileId,
        range: Range<usize>,
        name: String,
    },
    PointerToPointerInvalid {
        file_id: FileId,
        range: Range<usize>,
    },
    PointerToVoidMustBeAnnotated {
        file_id: FileId,
        range: Range<usize>,
    },
    PointerToArrayNotAllowed {
        file_id: FileId,
        range: Range<usize>,
    },
    VectorDoesNotStartWithArrowBracket {
        file_id: FileId,
        range: Range<usize>,
    },
    VectorNameIdentifierNotFound {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
    TypeInVectorMustBePreviouslyDefined {
        file_id: FileId,
        range: Range<usize>,
        name: String,
    },
    OnlySingleDimensionsSupported {
        file_id: FileId,
        range: Range<usize>,
    },
    ArrayDimensionIdentifierInvalid {
        file_id: FileId,
        range: Range<usize>,
        found: String,
    },
}

impl Message {
    /// The stable error id shown as the diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            Message::UnexpectedCharacter { .. }
            | Message::UnterminatedComment { .. }
            | Message::MalformedIntegerLiteral { .. }
            | Message::UnexpectedToken { .. } => "EdlUnexpectedToken",
            Message::ExpectedTokenNotFound { .. } => "EdlExpectedTokenNotFound",
            Message::DuplicateTypeDefinition { .. } => "EdlDuplicateTypeDefinition",
            Message::TypeNameIdentifierIsReserved { .. } => "EdlTypeNameIdentifierIsReserved",
            Message::DuplicateFieldOrParameter { .. } => "EdlDuplicateFieldOrParameter",
            Message::DuplicateFunctionDeclaration { .. } => "EdlDuplicateFunctionDeclaration",
            Message::EnumNameIdentifierNotFound { .. } => "EdlEnumNameIdentifierNotFound",
            Message::EnumValueIdentifierNotFound { .. } => "EdlEnumValueIdentifierNotFound",
            Message::EnumValueNotFound { .. } => "EdlEnumValueNotFound",
            Message::EnumNameDuplicated { .. } => "EdlEnumNameDuplicated",
            Message::StructIdentifierNotFound { .. } => "EdlStructIdentifierNotFound",
            Message::FunctionIdentifierNotFound { .. } => "EdlFunctionIdentifierNotFound",
            Message::IdentifierNameNotFound { .. } => "EdlIdentifierNameNotFound",
            Message::ReturnValuesCannotBePointers { .. } => "EdlReturnValuesCannotBePointers",
            Message::InvalidAttribute { .. } => "EdlInvalidAttribute",
            Message::NonSizeOrCountAttributeInStruct { .. } => {
                "EdlNonSizeOrCountAttributeInStruct"
            }
            Message::DuplicateAttributeFound { .. } => "EdlDuplicateAttributeFound",
            Message::SizeOrCountValueInvalid { .. } => "EdlSizeOrCountValueInvalid",
            Message::SizeAndCountNotValidForNonPointer { .. } => {
                "EdlSizeAndCountNotValidForNonPointer"
            }
            Message::SizeOrCountAttributeNotFound { .. } => "EdlSizeOrCountAttributeNotFound",
            Message::SizeOrCountForArrayNotValid { .. } => "EdlSizeOrCountForArrayNotValid",
            Message::SizeOrCountInvalidType { .. } => "EdlSizeOrCountInvalidType",
            Message::DeveloperTypesMustBeDefinedBeforeUse { .. } => {
                "EdlDeveloperTypesMustBeDefinedBeforeUse"
            }
            Message::PointerToPointerInvalid { .. } => "EdlPointerToPointerInvalid",
            Message::PointerToVoidMustBeAnnotated { .. } => "EdlPointerToVoidMustBeAnnotated",
            Message::PointerToArrayNotAllowed { .. } => "EdlPointerToArrayNotAllowed",
            Message::VectorDoesNotStartWithArrowBracket { .. } => {
                "EdlVectorDoesNotStartWithArrowBracket"
            }
            Message::VectorNameIdentifierNotFound { .. } => "EdlVectorNameIdentifierNotFound",
            Message::TypeInVectorMustBePreviouslyDefined { .. } => {
                "EdlTypeInVectorMustBePreviouslyDefined"
            }
            Message::OnlySingleDimensionsSupported { .. } => "EdlOnlySingleDimensionsSupported",
            Message::ArrayDimensionIdentifierInvalid { .. } => {
                "EdlArrayDimensionIdentifierInvalid"
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let diagnostic = match self {
            Message::UnexpectedCharacter {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("unexpected character `{}`", found.escape_default()))
                .with_labels(vec![Label::primary(*file_id, range.clone())
                    .with_message("unexpected character")])
                .with_notes(vec![
                    "EDL sources are 7-bit ASCII outside of comments".to_owned()
                ]),
            Message::UnterminatedComment { file_id, range } => Diagnostic::error()
                .with_message("unterminated block comment")
                .with_labels(vec![Label::primary(*file_id, range.clone())
                    .with_message("comment opened here")]),
            Message::MalformedIntegerLiteral {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("malformed integer literal `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::ExpectedTokenNotFound {
                file_id,
                range,
                expected,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected `{}`, found `{}`", expected, found))
                .with_labels(vec![Label::primary(*file_id, range.clone())
                    .with_message(format!("expected `{}`", expected))]),
            Message::UnexpectedToken {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("unexpected token `{}`", found))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("unexpected token")
                ]),
            Message::DuplicateTypeDefinition {
                file_id,
                range,
                name,
            } => Diagnostic::error()
                .with_message(format!("the type `{}` is defined multiple times", name))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("redefined here")
                ]),
            Message::TypeNameIdentifierIsReserved {
                file_id,
                range,
                name,
            } => Diagnostic::error()
                .with_message(format!("`{}` is a reserved type word", name))
                .with_labels(vec![Label::primary(*file_id, range.clone())
                    .with_message("cannot be used as a name")]),
            Message::DuplicateFieldOrParameter {
                file_id,
                range,
                name,
                parent,
            } => Diagnostic::error()
                .with_message(format!("`{}` is declared twice in `{}`", name, parent))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("declared again here")
                ]),
            Message::DuplicateFunctionDeclaration {
                file_id,
                range,
                name,
            } => Diagnostic::error()
                .with_message(format!(
                    "the function `{}` is declared twice with the same signature",
                    name,
                ))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("declared again here")
                ]),
            Message::EnumNameIdentifierNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected an enum name, found `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::EnumValueIdentifierNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected an enum item name, found `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::EnumValueNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!(
                    "expected a decimal or hexadecimal value, found `{}`",
                    found,
                ))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::EnumNameDuplicated {
                file_id,
                range,
                name,
            } => Diagnostic::error()
                .with_message(format!("the enum item `{}` is declared twice", name))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("declared again here")
                ]),
            Message::StructIdentifierNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected a struct name, found `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::FunctionIdentifierNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected a function name, found `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::IdentifierNameNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected an identifier, found `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::ReturnValuesCannotBePointers {
                file_id,
                range,
                function,
            } => Diagnostic::error()
                .with_message(format!("the function `{}` returns a pointer", function))
                .with_labels(vec![Label::primary(*file_id, range.clone())])
                .with_notes(vec![
                    "wrap the pointer in a struct with a size or count attribute so the \
                     boundary layer knows how much memory to copy"
                        .to_owned(),
                ]),
            Message::InvalidAttribute {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("invalid attribute `{}`", found))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("unknown attribute")
                ])
                .with_notes(vec![
                    "valid attributes are `in`, `out`, `size=..` and `count=..`".to_owned(),
                ]),
            Message::NonSizeOrCountAttributeInStruct { file_id, range } => Diagnostic::error()
                .with_message("only `size` and `count` attributes are valid on struct fields")
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::DuplicateAttributeFound { file_id, range } => Diagnostic::error()
                .with_message("attribute specified more than once")
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::SizeOrCountValueInvalid {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("`{}` is not a valid size or count value", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())])
                .with_notes(vec![
                    "size and count values are unsigned integers or identifiers".to_owned(),
                ]),
            Message::SizeAndCountNotValidForNonPointer {
                file_id,
                range,
                type_name,
            } => Diagnostic::error()
                .with_message(format!(
                    "size and count attributes are only valid on pointers, `{}` is not a pointer",
                    type_name,
                ))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::SizeOrCountAttributeNotFound {
                file_id,
                range,
                name,
                parent,
            } => Diagnostic::error()
                .with_message(format!(
                    "the size or count value `{}` is not defined in `{}`",
                    name, parent,
                ))
                .with_labels(vec![Label::primary(*file_id, range.clone())
                    .with_message("not an anonymous enum item or sibling declaration")]),
            Message::SizeOrCountForArrayNotValid {
                file_id,
                range,
                parent,
            } => Diagnostic::error()
                .with_message(format!(
                    "a size or count attribute in `{}` refers to an array",
                    parent,
                ))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::SizeOrCountInvalidType {
                file_id,
                range,
                type_name,
                parent,
            } => Diagnostic::error()
                .with_message(format!(
                    "a size or count attribute in `{}` refers to a value of type `{}`",
                    parent, type_name,
                ))
                .with_labels(vec![Label::primary(*file_id, range.clone())])
                .with_notes(vec![
                    "size and count values must be `uint8_t`, `uint16_t`, `uint32_t`, \
                     `uint64_t` or `size_t`"
                        .to_owned(),
                ]),
            Message::DeveloperTypesMustBeDefinedBeforeUse {
                file_id,
                range,
                name,
            } => Diagnostic::error()
                .with_message(format!("the type `{}` is used before it is defined", name))
                .with_labels(vec![
                    Label::primary(*file_id, range.clone()).with_message("not yet defined")
                ]),
            Message::PointerToPointerInvalid { file_id, range } => Diagnostic::error()
                .with_message("pointers to pointers are not supported")
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::PointerToVoidMustBeAnnotated { file_id, range } => Diagnostic::error()
                .with_message("`void*` declarations must carry a size or count attribute")
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::PointerToArrayNotAllowed { file_id, range } => Diagnostic::error()
                .with_message("pointers to arrays are not allowed")
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::VectorDoesNotStartWithArrowBracket { file_id, range } => {
                Diagnostic::error()
                    .with_message("expected `<` after `vector`")
                    .with_labels(vec![Label::primary(*file_id, range.clone())])
            }
            Message::VectorNameIdentifierNotFound {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected a vector element type, found `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::TypeInVectorMustBePreviouslyDefined {
                file_id,
                range,
                name,
            } => Diagnostic::error()
                .with_message(format!("the vector element type `{}` is not defined", name))
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::OnlySingleDimensionsSupported { file_id, range } => Diagnostic::error()
                .with_message("only single dimensions are supported")
                .with_labels(vec![Label::primary(*file_id, range.clone())]),
            Message::ArrayDimensionIdentifierInvalid {
                file_id,
                range,
                found,
            } => Diagnostic::error()
                .with_message(format!("invalid array dimension `{}`", found))
                .with_labels(vec![Label::primary(*file_id, range.clone())])
                .with_notes(vec![
                    "array dimensions are unsigned integers or anonymous enum items".to_owned(),
                ]),
        };

        diagnostic.with_code(self.code())
    }
}
