//! A recursive-descent parser and semantic analyser for EDL files.
//!
//! The parser drives the lexer through a two-token lookahead window and
//! builds the [`Edl`] IR directly, enforcing the semantic rules as it goes:
//! strict definition-before-use, attribute validity, pointer rules, and the
//! size/count cross-references that can only be checked once a whole
//! parameter list or struct is known. Two passes run after the body is
//! consumed: size/count reference resolution, and transitive propagation of
//! the pointer/container flags through struct-valued fields.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::edl::lexer::{Lexer, Token, TokenKind};
use crate::edl::{
    type_kind_from_keyword, Declaration, DeclarationParentKind, DeveloperType, Edl, EdlTypeInfo,
    EdlTypeKind, EnumItem, Function, FunctionKind, ParsedAttributeInfo, ANONYMOUS_ENUM_NAME,
    RETURN_VALUE_NAME,
};
use crate::files::FileId;
use crate::reporting::Message;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AttributeKind {
    In,
    Out,
    Size,
    Count,
}

pub struct Parser<'source> {
    file_id: FileId,
    edl_name: String,
    lexer: Lexer<'source>,
    current: Token,
    next: Token,
    /// Byte range of the most recently consumed token, used for diagnostics
    /// raised between tokens.
    last_range: Range<usize>,
    developer_types: HashMap<String, DeveloperType>,
    developer_types_order: Vec<String>,
    trusted_signatures: HashSet<String>,
    untrusted_signatures: HashSet<String>,
    trusted_functions: Vec<Function>,
    untrusted_functions: Vec<Function>,
    /// Shared across the trusted and untrusted blocks so ABI names stay
    /// unique within the whole file.
    abi_function_index: u64,
}

impl<'source> Parser<'source> {
    pub fn new(
        file_id: FileId,
        edl_name: &str,
        source: &'source str,
    ) -> Result<Parser<'source>, Message> {
        let mut lexer = Lexer::new(file_id, source);
        let current = lexer.next_token()?;
        let next = lexer.next_token()?;

        Ok(Parser {
            file_id,
            edl_name: edl_name.to_owned(),
            lexer,
            current,
            next,
            last_range: 0..0,
            developer_types: HashMap::new(),
            developer_types_order: Vec::new(),
            trusted_signatures: HashSet::new(),
            untrusted_signatures: HashSet::new(),
            trusted_functions: Vec::new(),
            untrusted_functions: Vec::new(),
            abi_function_index: 0,
        })
    }

    /// Consume the current token, sliding the lookahead window forward.
    fn advance(&mut self) -> Result<Token, Message> {
        let pulled = self.lexer.next_token()?;
        let consumed = std::mem::replace(&mut self.current, std::mem::replace(&mut self.next, pulled));
        self.last_range = consumed.range.clone();
        Ok(consumed)
    }

    /// Consume the current token, failing unless its text matches.
    fn expect(&mut self, expected: &str) -> Result<Token, Message> {
        let token = self.advance()?;
        if token != expected {
            return Err(Message::ExpectedTokenNotFound {
                file_id: self.file_id,
                range: token.range.clone(),
                expected: expected.to_owned(),
                found: token.to_string(),
            });
        }
        Ok(token)
    }

    fn check_reserved(&self, token: &Token) -> Result<(), Message> {
        if type_kind_from_keyword(&token.text).is_some() {
            return Err(Message::TypeNameIdentifierIsReserved {
                file_id: self.file_id,
                range: token.range.clone(),
                name: token.text.clone(),
            });
        }
        Ok(())
    }

    fn check_duplicate_definition(&self, token: &Token) -> Result<(), Message> {
        if self.developer_types.contains_key(&token.text) {
            return Err(Message::DuplicateTypeDefinition {
                file_id: self.file_id,
                range: token.range.clone(),
                name: token.text.clone(),
            });
        }
        Ok(())
    }

    pub fn parse(mut self) -> Result<Edl, Message> {
        self.expect("enclave")?;
        self.expect("{")?;

        while self.current != "}" && !self.current.is_eof() {
            let token = self.advance()?;

            if token == "trusted" {
                self.parse_functions(FunctionKind::Trusted)?;
            } else if token == "untrusted" {
                self.parse_functions(FunctionKind::Untrusted)?;
            } else if token == "enum" {
                self.parse_enum()?;
            } else if token == "struct" {
                self.parse_struct()?;
            } else {
                return Err(Message::UnexpectedToken {
                    file_id: self.file_id,
                    range: token.range.clone(),
                    found: token.to_string(),
                });
            }
        }

        self.expect("}")?;
        self.validate_size_and_count_references()?;
        self.update_developer_type_metadata();

        Ok(Edl {
            name: self.edl_name,
            developer_types: self.developer_types,
            developer_types_order: self.developer_types_order,
            trusted_functions: self.trusted_functions,
            untrusted_functions: self.untrusted_functions,
        })
    }

    fn parse_enum(&mut self) -> Result<(), Message> {
        let identifier = self.advance()?;
        let anonymous = identifier == "{";

        // Anonymous blocks accumulate into one entity for the whole file; a
        // second block appends to the items parsed so far.
        let mut developer_type = if anonymous {
            match self.developer_types.remove(ANONYMOUS_ENUM_NAME) {
                Some(existing) => existing,
                None => {
                    self.developer_types_order.push(ANONYMOUS_ENUM_NAME.to_owned());
                    DeveloperType::new(ANONYMOUS_ENUM_NAME, EdlTypeKind::AnonymousEnum)
                }
            }
        } else {
            if !identifier.is_identifier() {
                return Err(Message::EnumNameIdentifierNotFound {
                    file_id: self.file_id,
                    range: identifier.range.clone(),
                    found: identifier.to_string(),
                });
            }
            self.check_reserved(&identifier)?;
            self.check_duplicate_definition(&identifier)?;
            self.expect("{")?;
            self.developer_types_order.push(identifier.text.clone());
            DeveloperType::new(identifier.text.clone(), EdlTypeKind::Enum)
        };

        let mut position: u64 = 0;
        let mut previous_hex = false;
        let mut is_default = true; // the first item is always the default

        while self.current != "}" {
            let item_token = self.advance()?;
            if !anonymous && !item_token.is_identifier() {
                return Err(Message::EnumValueIdentifierNotFound {
                    file_id: self.file_id,
                    range: item_token.range.clone(),
                    found: item_token.to_string(),
                });
            }

            let mut item = EnumItem {
                name: item_token.text.clone(),
                declared_position: position,
                is_hex: previous_hex,
                is_default_value: is_default,
                explicit_value: None,
            };

            // Items without `= value` inherit the running counter.
            if self.current == "=" {
                self.advance()?;
                let value_token = self.advance()?;

                let value = match value_token.kind {
                    TokenKind::UnsignedInteger => {
                        previous_hex = false;
                        item.is_hex = false;
                        value_token.text.parse::<u64>().ok()
                    }
                    TokenKind::HexInteger => {
                        previous_hex = true;
                        item.is_hex = true;
                        u64::from_str_radix(&value_token.text[2..], 16).ok()
                    }
                    _ => None,
                };

                let value = match value {
                    Some(value) => value,
                    None => {
                        return Err(Message::EnumValueNotFound {
                            file_id: self.file_id,
                            range: value_token.range.clone(),
                            found: value_token.to_string(),
                        })
                    }
                };

                item.declared_position = value;
                position = value;
                item.explicit_value = Some(value_token);
            }

            if self.current != "}" {
                self.expect(",")?;
            }

            if developer_type.has_item(&item.name) {
                return Err(Message::EnumNameDuplicated {
                    file_id: self.file_id,
                    range: item_token.range.clone(),
                    name: item.name,
                });
            }

            developer_type.items.push(item);
            position += 1;
            is_default = false;
        }

        self.expect("}")?;
        self.expect(";")?;

        self.developer_types
            .insert(developer_type.name.clone(), developer_type);
        Ok(())
    }

    fn parse_struct(&mut self) -> Result<(), Message> {
        let name_token = self.advance()?;
        if !name_token.is_identifier() {
            return Err(Message::StructIdentifierNotFound {
                file_id: self.file_id,
                range: name_token.range.clone(),
                found: name_token.to_string(),
            });
        }
        self.check_reserved(&name_token)?;
        self.check_duplicate_definition(&name_token)?;
        self.expect("{")?;

        let mut developer_type = DeveloperType::new(name_token.text.clone(), EdlTypeKind::Struct);
        developer_type.fields =
            self.parse_declaration_list(DeclarationParentKind::Struct, &name_token.text, "}", ";")?;

        // Direct flags; struct-valued fields are folded in by the transitive
        // pass once every type is known.
        developer_type.contains_inner_pointer =
            developer_type.fields.iter().any(Declaration::has_pointer);
        developer_type.contains_container_type =
            developer_type.fields.iter().any(Declaration::is_container);

        self.expect("}")?;
        self.expect(";")?;

        self.developer_types_order.push(developer_type.name.clone());
        self.developer_types
            .insert(developer_type.name.clone(), developer_type);
        Ok(())
    }

    fn parse_functions(&mut self, kind: FunctionKind) -> Result<(), Message> {
        self.expect("{")?;

        while self.current != "}" && !self.current.is_eof() {
            let mut function = self.parse_function_declaration()?;

            let signature = function.declaration_signature();
            let signatures = match kind {
                FunctionKind::Trusted => &mut self.trusted_signatures,
                FunctionKind::Untrusted => &mut self.untrusted_signatures,
            };
            if !signatures.insert(signature) {
                return Err(Message::DuplicateFunctionDeclaration {
                    file_id: self.file_id,
                    range: self.last_range.clone(),
                    name: function.name,
                });
            }

            // Developer functions may share a name with different parameters,
            // so the transport-level name carries a unique index.
            function.abi_name = format!("{}_{}", function.name, self.abi_function_index);
            self.abi_function_index += 1;

            match kind {
                FunctionKind::Trusted => self.trusted_functions.push(function),
                FunctionKind::Untrusted => self.untrusted_functions.push(function),
            }
        }

        self.expect("}")?;
        self.expect(";")?;
        Ok(())
    }

    fn parse_function_declaration(&mut self) -> Result<Function, Message> {
        let return_type = self.parse_type_info()?;

        let name_token = self.advance()?;
        if !name_token.is_identifier() {
            return Err(Message::FunctionIdentifierNotFound {
                file_id: self.file_id,
                range: name_token.range.clone(),
                found: name_token.to_string(),
            });
        }

        // Pointers cannot be returned directly: the boundary layer would not
        // know how much memory they govern. Developers wrap them in structs
        // with size/count attributes instead.
        if return_type.is_pointer {
            return Err(Message::ReturnValuesCannotBePointers {
                file_id: self.file_id,
                range: name_token.range.clone(),
                function: name_token.text.clone(),
            });
        }
        self.check_reserved(&name_token)?;

        let return_info = Declaration {
            parent_kind: DeclarationParentKind::Function,
            name: RETURN_VALUE_NAME.to_owned(),
            type_info: return_type,
            array_dimensions: Vec::new(),
            attribute_info: Some(ParsedAttributeInfo {
                out_present: true,
                ..ParsedAttributeInfo::default()
            }),
        };

        self.expect("(")?;
        let name = name_token.text.clone();
        let parameters =
            self.parse_declaration_list(DeclarationParentKind::Function, &name, ")", ",")?;
        self.expect(")")?;
        self.expect(";")?;

        Ok(Function {
            name,
            abi_name: String::new(),
            return_info,
            parameters,
        })
    }

    fn parse_declaration_list(
        &mut self,
        parent_kind: DeclarationParentKind,
        parent_name: &str,
        list_end: &str,
        separator: &str,
    ) -> Result<Vec<Declaration>, Message> {
        let mut declarations: Vec<Declaration> = Vec::new();
        let mut names = HashSet::new();

        while self.current != list_end && !self.current.is_eof() {
            let mut declaration = self.parse_declaration(parent_kind)?;

            // `[in]` is implicit on function parameters; struct fields have
            // no direction.
            if parent_kind == DeclarationParentKind::Function
                && declaration.attribute_info.is_none()
            {
                declaration.attribute_info = Some(ParsedAttributeInfo::in_only());
            }

            self.validate_pointers(&declaration)?;

            if !names.insert(declaration.name.clone()) {
                return Err(Message::DuplicateFieldOrParameter {
                    file_id: self.file_id,
                    range: self.last_range.clone(),
                    name: declaration.name,
                    parent: parent_name.to_owned(),
                });
            }
            declarations.push(declaration);

            if self.current != list_end {
                self.expect(separator)?;
            }
        }

        Ok(declarations)
    }

    fn parse_declaration(
        &mut self,
        parent_kind: DeclarationParentKind,
    ) -> Result<Declaration, Message> {
        let attribute_info = self.parse_attributes(parent_kind)?;
        let type_info = self.parse_type_info()?;

        let name_token = self.advance()?;
        if !name_token.is_identifier() {
            return Err(Message::IdentifierNameNotFound {
                file_id: self.file_id,
                range: name_token.range.clone(),
                found: name_token.to_string(),
            });
        }
        self.check_reserved(&name_token)?;

        let array_dimensions = self.parse_array_dimensions()?;

        let declaration = Declaration {
            parent_kind,
            name: name_token.text.clone(),
            type_info,
            array_dimensions,
            attribute_info,
        };
        self.validate_size_and_count_target(&declaration)?;
        Ok(declaration)
    }

    fn parse_attributes(
        &mut self,
        parent_kind: DeclarationParentKind,
    ) -> Result<Option<ParsedAttributeInfo>, Message> {
        // Attributes only ever appear in square brackets before a
        // declaration, e.g. `[in] uint8_t byte`.
        if self.current != "[" {
            return Ok(None);
        }
        self.advance()?;

        let mut info = ParsedAttributeInfo::default();
        let mut seen = Vec::new();

        while self.current != "]" && !self.current.is_eof() {
            let token = self.advance()?;
            let attribute = match token.text.as_str() {
                "in" => AttributeKind::In,
                "out" => AttributeKind::Out,
                "size" => AttributeKind::Size,
                "count" => AttributeKind::Count,
                _ => {
                    return Err(Message::InvalidAttribute {
                        file_id: self.file_id,
                        range: token.range.clone(),
                        found: token.to_string(),
                    })
                }
            };

            let size_or_count = matches!(attribute, AttributeKind::Size | AttributeKind::Count);
            if parent_kind == DeclarationParentKind::Struct && !size_or_count {
                return Err(Message::NonSizeOrCountAttributeInStruct {
                    file_id: self.file_id,
                    range: token.range.clone(),
                });
            }

            // e.g. `[size=12, size=13]`
            if seen.contains(&attribute) {
                return Err(Message::DuplicateAttributeFound {
                    file_id: self.file_id,
                    range: token.range.clone(),
                });
            }
            seen.push(attribute);

            if size_or_count {
                self.expect("=")?;
                let value = self.advance()?;
                if !value.is_identifier() && !value.is_unsigned_integer() {
                    return Err(Message::SizeOrCountValueInvalid {
                        file_id: self.file_id,
                        range: value.range.clone(),
                        found: value.to_string(),
                    });
                }
                match attribute {
                    AttributeKind::Size => info.size_info = Some(value),
                    _ => info.count_info = Some(value),
                }
            } else {
                match attribute {
                    AttributeKind::In => info.in_present = true,
                    _ => info.out_present = true,
                }
            }
            info.in_and_out_present = info.in_present && info.out_present;

            if self.current != "]" {
                self.expect(",")?;
            }
        }

        self.expect("]")?;
        Ok(Some(info))
    }

    fn parse_type_info(&mut self) -> Result<EdlTypeInfo, Message> {
        let type_token = self.advance()?;
        if !type_token.is_identifier() {
            return Err(Message::IdentifierNameNotFound {
                file_id: self.file_id,
                range: type_token.range.clone(),
                found: type_token.to_string(),
            });
        }

        let mut type_info = if let Some(kind) = type_kind_from_keyword(&type_token.text) {
            if kind == EdlTypeKind::Vector {
                self.parse_vector()?
            } else {
                EdlTypeInfo::new(type_token.text.clone(), kind)
            }
        } else if let Some(developer_type) = self.developer_types.get(&type_token.text) {
            EdlTypeInfo::new(developer_type.name.clone(), developer_type.kind)
        } else {
            return Err(Message::DeveloperTypesMustBeDefinedBeforeUse {
                file_id: self.file_id,
                range: type_token.range.clone(),
                name: type_token.text.clone(),
            });
        };

        if self.current == "*" {
            self.advance()?;
            type_info.is_pointer = true;

            if self.current == "*" {
                return Err(Message::PointerToPointerInvalid {
                    file_id: self.file_id,
                    range: self.current.range.clone(),
                });
            }
        }

        Ok(type_info)
    }

    fn parse_vector(&mut self) -> Result<EdlTypeInfo, Message> {
        let mut vector_info = EdlTypeInfo::new("vector", EdlTypeKind::Vector);

        if self.current != "<" {
            return Err(Message::VectorDoesNotStartWithArrowBracket {
                file_id: self.file_id,
                range: self.current.range.clone(),
            });
        }

        self.advance()?;
        let element_token = self.advance()?;
        if !element_token.is_identifier() {
            return Err(Message::VectorNameIdentifierNotFound {
                file_id: self.file_id,
                range: element_token.range.clone(),
                found: element_token.to_string(),
            });
        }

        if let Some(kind) = type_kind_from_keyword(&element_token.text) {
            // Nested vectors share the single-dimension diagnostic with
            // multi-dimensional arrays.
            if kind == EdlTypeKind::Vector {
                return Err(Message::OnlySingleDimensionsSupported {
                    file_id: self.file_id,
                    range: element_token.range.clone(),
                });
            }
            vector_info.inner = Some(Box::new(EdlTypeInfo::new(element_token.text.clone(), kind)));
        } else if let Some(developer_type) = self.developer_types.get(&element_token.text) {
            vector_info.inner = Some(Box::new(EdlTypeInfo::new(
                developer_type.name.clone(),
                developer_type.kind,
            )));
        } else {
            return Err(Message::TypeInVectorMustBePreviouslyDefined {
                file_id: self.file_id,
                range: element_token.range.clone(),
                name: element_token.text.clone(),
            });
        }

        self.expect(">")?;
        Ok(vector_info)
    }

    fn parse_array_dimensions(&mut self) -> Result<Vec<Token>, Message> {
        let mut dimensions = Vec::new();

        while self.current == "[" {
            if !dimensions.is_empty() {
                return Err(Message::OnlySingleDimensionsSupported {
                    file_id: self.file_id,
                    range: self.current.range.clone(),
                });
            }

            self.advance()?;
            let value_token = self.advance()?;

            let is_integer = value_token.is_unsigned_integer();
            let is_valid_identifier = value_token.is_identifier()
                && self
                    .developer_types
                    .get(ANONYMOUS_ENUM_NAME)
                    .map_or(false, |anonymous| anonymous.has_item(&value_token.text));

            if !is_integer && !is_valid_identifier {
                return Err(Message::ArrayDimensionIdentifierInvalid {
                    file_id: self.file_id,
                    range: value_token.range.clone(),
                    found: value_token.to_string(),
                });
            }

            dimensions.push(value_token);
            self.expect("]")?;
        }

        Ok(dimensions)
    }

    fn validate_pointers(&self, declaration: &Declaration) -> Result<(), Message> {
        if !declaration.has_pointer() {
            return Ok(());
        }

        // A `void*` is opaque: without a size or count the boundary layer
        // cannot know how much memory to copy.
        if declaration.is_edl_type(EdlTypeKind::Void) {
            let annotated = declaration
                .attribute_info
                .as_ref()
                .map_or(false, ParsedAttributeInfo::is_size_or_count_present);
            if !annotated {
                return Err(Message::PointerToVoidMustBeAnnotated {
                    file_id: self.file_id,
                    range: self.last_range.clone(),
                });
            }
        }

        let info = match &declaration.attribute_info {
            Some(info) => info,
            None => return Ok(()),
        };
        let in_or_out_present = info.in_present || info.out_present;

        if declaration.parent_kind == DeclarationParentKind::Function
            && in_or_out_present
            && (!declaration.array_dimensions.is_empty() || declaration.is_container())
        {
            return Err(Message::PointerToArrayNotAllowed {
                file_id: self.file_id,
                range: self.last_range.clone(),
            });
        }

        Ok(())
    }

    fn validate_size_and_count_target(&self, declaration: &Declaration) -> Result<(), Message> {
        let info = match &declaration.attribute_info {
            Some(info) => info,
            None => return Ok(()),
        };

        if info.is_size_or_count_present() && !declaration.has_pointer() {
            return Err(Message::SizeAndCountNotValidForNonPointer {
                file_id: self.file_id,
                range: self.last_range.clone(),
                type_name: declaration.type_info.name.clone(),
            });
        }
        Ok(())
    }

    /// Resolve every `size=`/`count=` identifier now that whole parameter
    /// lists and structs are known.
    fn validate_size_and_count_references(&self) -> Result<(), Message> {
        for function in &self.trusted_functions {
            self.validate_size_and_count_in(&function.name, &function.parameters)?;
        }
        for function in &self.untrusted_functions {
            self.validate_size_and_count_in(&function.name, &function.parameters)?;
        }
        for name in &self.developer_types_order {
            let developer_type = &self.developer_types[name];
            self.validate_size_and_count_in(&developer_type.name, &developer_type.fields)?;
        }
        Ok(())
    }

    fn validate_size_and_count_in(
        &self,
        parent_name: &str,
        declarations: &[Declaration],
    ) -> Result<(), Message> {
        for declaration in declarations {
            let info = match &declaration.attribute_info {
                Some(info) => info,
                None => continue,
            };

            for token in [&info.size_info, &info.count_info].into_iter().flatten() {
                // Integer literals need no resolution.
                if !token.is_identifier() {
                    continue;
                }

                // Resolution order: anonymous enum item first, then a sibling
                // declaration in the same list.
                if self
                    .developer_types
                    .get(ANONYMOUS_ENUM_NAME)
                    .map_or(false, |anonymous| anonymous.has_item(&token.text))
                {
                    continue;
                }

                let target = declarations
                    .iter()
                    .find(|declaration| declaration.name == token.text);
                let target = match target {
                    Some(target) => target,
                    None => {
                        return Err(Message::SizeOrCountAttributeNotFound {
                            file_id: self.file_id,
                            range: token.range.clone(),
                            name: token.text.clone(),
                            parent: parent_name.to_owned(),
                        })
                    }
                };

                if !target.array_dimensions.is_empty() {
                    return Err(Message::SizeOrCountForArrayNotValid {
                        file_id: self.file_id,
                        range: token.range.clone(),
                        parent: parent_name.to_owned(),
                    });
                }

                if !target.type_info.kind.is_valid_size_or_count_type() {
                    return Err(Message::SizeOrCountInvalidType {
                        file_id: self.file_id,
                        range: token.range.clone(),
                        type_name: target.type_info.name.clone(),
                        parent: parent_name.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Fold struct-valued fields into the pointer/container flags. One scan
    /// in insertion order suffices: a field's type is always defined before
    /// the struct that uses it.
    fn update_developer_type_metadata(&mut self) {
        for name in self.developer_types_order.clone() {
            let developer_type = &self.developer_types[&name];
            if developer_type.contains_inner_pointer && developer_type.contains_container_type {
                continue;
            }

            let struct_field_types: Vec<String> = developer_type
                .fields
                .iter()
                .filter(|field| field.is_edl_type(EdlTypeKind::Struct))
                .map(|field| field.type_info.name.clone())
                .collect();

            let mut contains_inner_pointer = false;
            let mut contains_container_type = false;
            for field_type_name in &struct_field_types {
                let field_type = &self.developer_types[field_type_name];
                contains_inner_pointer |= field_type.contains_inner_pointer;
                contains_container_type |= field_type.contains_container_type;
            }

            if let Some(developer_type) = self.developer_types.get_mut(&name) {
                developer_type.contains_inner_pointer |= contains_inner_pointer;
                developer_type.contains_container_type |= contains_container_type;
            }
        }
    }
}
