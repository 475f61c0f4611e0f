use crate::db::{self, FileTxn};
use crate::indexer::category::{self, Category};
use crate::indexer::grammar::Grammar;
use crate::model::{ANON_NAME, EdgeKind, NodeInput, NodeKind};
use std::rc::Rc;
use tree_sitter::{Node, Tree};

/// Write side of the graph as seen by the extractor.
pub trait GraphSink {
    fn get_or_create_node(&mut self, input: &NodeInput) -> db::Result<i64>;
    fn create_edge(&mut self, source_id: i64, target_id: i64, kind: EdgeKind) -> db::Result<bool>;
}

impl GraphSink for FileTxn<'_> {
    fn get_or_create_node(&mut self, input: &NodeInput) -> db::Result<i64> {
        FileTxn::get_or_create_node(self, input)
    }

    fn create_edge(&mut self, source_id: i64, target_id: i64, kind: EdgeKind) -> db::Result<bool> {
        FileTxn::create_edge(self, source_id, target_id, kind)
    }
}

/// One parsed file handed to the extractor.
#[derive(Debug, Clone, Copy)]
pub struct FileSource<'a> {
    pub rel_path: &'a str,
    pub bytes: &'a [u8],
    pub grammar: Grammar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Recognized constructs visited.
    pub entities: usize,
    /// `contains` edges newly written.
    pub edges: usize,
}

struct Frame<'tree> {
    node: Node<'tree>,
    parent_id: i64,
    parent_kind: NodeKind,
    /// Ids from the file node down to `parent_id`, inclusive.
    ancestors: Rc<Vec<i64>>,
}

/// Walk `tree` depth-first, pre-order, and write one node plus one
/// `contains` edge per recognized construct under `file_node_id`.
///
/// Uses an explicit stack, so nesting depth in the source does not grow the
/// call stack. Children are pushed in reverse so they are visited in source
/// order.
pub fn extract_entities<S: GraphSink>(
    tree: &Tree,
    source: &FileSource<'_>,
    file_node_id: i64,
    sink: &mut S,
) -> db::Result<ExtractStats> {
    let rules = category::rules_for(source.grammar);
    let mut stats = ExtractStats::default();
    let mut stack = vec![Frame {
        node: tree.root_node(),
        parent_id: file_node_id,
        parent_kind: NodeKind::File,
        ancestors: Rc::new(vec![file_node_id]),
    }];

    while let Some(frame) = stack.pop() {
        let mut parent_id = frame.parent_id;
        let mut parent_kind = frame.parent_kind;
        let mut ancestors = frame.ancestors;

        let rule = category::classify(rules, frame.node);
        let category = rule.map(|rule| rule.category).unwrap_or(Category::Other);
        if let (Some(rule), Some(kind)) = (rule, category::resolve_kind(category, frame.parent_kind))
        {
            let name = category::name_node(frame.node, rule.name)
                .map(|name| node_text(name, source.bytes))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| ANON_NAME.to_string());
            let input = NodeInput {
                kind,
                name,
                file_path: source.rel_path.to_string(),
                start_line: frame.node.start_position().row as i64,
                end_line: frame.node.end_position().row as i64,
            };
            let id = sink.get_or_create_node(&input)?;
            stats.entities += 1;
            // A dedup collision with any ancestor would close a cycle, so the
            // construct folds into the current parent instead.
            if !ancestors.contains(&id) {
                if sink.create_edge(frame.parent_id, id, EdgeKind::Contains)? {
                    stats.edges += 1;
                }
                parent_id = id;
                parent_kind = kind;
                let mut chain = Vec::with_capacity(ancestors.len() + 1);
                chain.extend_from_slice(&ancestors);
                chain.push(id);
                ancestors = Rc::new(chain);
            }
        }

        let mut cursor = frame.node.walk();
        let children: Vec<Node<'_>> = frame.node.named_children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(Frame {
                node: child,
                parent_id,
                parent_kind,
                ancestors: Rc::clone(&ancestors),
            });
        }
    }

    Ok(stats)
}

fn node_text(node: Node<'_>, bytes: &[u8]) -> String {
    let range = node.byte_range();
    bytes
        .get(range)
        .map(|slice| String::from_utf8_lossy(slice).trim().to_string())
        .unwrap_or_default()
}
