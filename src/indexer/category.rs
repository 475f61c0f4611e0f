//! Closed mapping from grammar node kinds to the entities the graph records.

use crate::indexer::grammar::Grammar;
use crate::model::NodeKind;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Class,
    Function,
    Method,
    Other,
}

/// Where a construct's name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// A direct child field, `name` for most grammars.
    Field(&'static str),
    /// Follow `declarator` fields down to an identifier (C, C++).
    Declarator,
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub node_kind: &'static str,
    pub category: Category,
    pub name: NameSource,
    /// Only match when a `body` field is present, so forward declarations
    /// and type references are not materialized.
    pub requires_body: bool,
}

const fn named(node_kind: &'static str, category: Category) -> CategoryRule {
    CategoryRule {
        node_kind,
        category,
        name: NameSource::Field("name"),
        requires_body: false,
    }
}

const fn with_body(node_kind: &'static str, category: Category) -> CategoryRule {
    CategoryRule {
        node_kind,
        category,
        name: NameSource::Field("name"),
        requires_body: true,
    }
}

const fn declarator(node_kind: &'static str, category: Category) -> CategoryRule {
    CategoryRule {
        node_kind,
        category,
        name: NameSource::Declarator,
        requires_body: false,
    }
}

static PYTHON_RULES: &[CategoryRule] = &[
    named("function_definition", Category::Function),
    named("class_definition", Category::Class),
];

static JAVASCRIPT_RULES: &[CategoryRule] = &[
    named("function_declaration", Category::Function),
    named("generator_function_declaration", Category::Function),
    named("class_declaration", Category::Class),
    named("class", Category::Class),
    named("method_definition", Category::Method),
];

static TYPESCRIPT_RULES: &[CategoryRule] = &[
    named("function_declaration", Category::Function),
    named("generator_function_declaration", Category::Function),
    named("class_declaration", Category::Class),
    named("abstract_class_declaration", Category::Class),
    named("interface_declaration", Category::Class),
    named("class", Category::Class),
    named("method_definition", Category::Method),
];

static GO_RULES: &[CategoryRule] = &[
    named("function_declaration", Category::Function),
    named("method_declaration", Category::Method),
    named("type_spec", Category::Class),
];

static RUST_RULES: &[CategoryRule] = &[
    named("function_item", Category::Function),
    named("function_signature_item", Category::Method),
    named("struct_item", Category::Class),
    named("enum_item", Category::Class),
    named("union_item", Category::Class),
    named("trait_item", Category::Class),
    CategoryRule {
        node_kind: "impl_item",
        category: Category::Class,
        name: NameSource::Field("type"),
        requires_body: false,
    },
];

static C_RULES: &[CategoryRule] = &[
    declarator("function_definition", Category::Function),
    with_body("struct_specifier", Category::Class),
];

static CPP_RULES: &[CategoryRule] = &[
    declarator("function_definition", Category::Function),
    with_body("class_specifier", Category::Class),
    with_body("struct_specifier", Category::Class),
];

static JAVA_RULES: &[CategoryRule] = &[
    named("class_declaration", Category::Class),
    named("interface_declaration", Category::Class),
    named("enum_declaration", Category::Class),
    named("record_declaration", Category::Class),
    named("method_declaration", Category::Method),
    named("constructor_declaration", Category::Method),
];

pub fn rules_for(grammar: Grammar) -> &'static [CategoryRule] {
    match grammar {
        Grammar::Python => PYTHON_RULES,
        Grammar::JavaScript => JAVASCRIPT_RULES,
        Grammar::TypeScript | Grammar::Tsx => TYPESCRIPT_RULES,
        Grammar::Go => GO_RULES,
        Grammar::Rust => RUST_RULES,
        Grammar::C => C_RULES,
        Grammar::Cpp => CPP_RULES,
        Grammar::Java => JAVA_RULES,
    }
}

/// The rule matching `node`, if it is one of the recognized constructs.
pub fn classify(rules: &'static [CategoryRule], node: Node<'_>) -> Option<&'static CategoryRule> {
    let kind = node.kind();
    rules.iter().find(|rule| {
        rule.node_kind == kind
            && (!rule.requires_body || node.child_by_field_name("body").is_some())
    })
}

/// Entity kind for a recognized construct given the kind of its nearest
/// recognized ancestor. Functions defined directly inside a class-like
/// entity are methods.
pub fn resolve_kind(category: Category, parent: NodeKind) -> Option<NodeKind> {
    match category {
        Category::Class => Some(NodeKind::Class),
        Category::Method => Some(NodeKind::Method),
        Category::Function if parent == NodeKind::Class => Some(NodeKind::Method),
        Category::Function => Some(NodeKind::Function),
        Category::Other => None,
    }
}

const DECLARATOR_NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "qualified_identifier",
    "destructor_name",
    "operator_name",
    "type_identifier",
];

/// The node holding a construct's name, if the grammar provides one.
pub fn name_node<'tree>(node: Node<'tree>, source: NameSource) -> Option<Node<'tree>> {
    match source {
        NameSource::Field(field) => node.child_by_field_name(field),
        NameSource::Declarator => {
            let mut current = node.child_by_field_name("declarator")?;
            loop {
                if DECLARATOR_NAME_KINDS.contains(&current.kind()) {
                    return Some(current);
                }
                current = match current.child_by_field_name("declarator") {
                    Some(next) => next,
                    // Reference and parenthesized declarators wrap their
                    // inner declarator without naming the field.
                    None => inner_declarator(current)?,
                };
            }
        }
    }
}

fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let inner = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "parameter_list");
    inner
}
