use crate::error::CrashError;

/// Index of a node inside a [`LineTree`].
pub type NodeId = usize;

/// One input line with its indentation stripped.
#[derive(Debug, Clone)]
pub struct LineNode {
    pub content: String,
    pub children: Vec<NodeId>,
    /// `None` only for the synthetic root.
    pub parent: Option<NodeId>,
}

/// Indentation tree stored as an arena. Node 0 is the contentless root.
#[derive(Debug, Clone)]
pub struct LineTree {
    nodes: Vec<LineNode>,
}

/// Borrowed view of one node, used by the interpreters to walk the tree.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a LineTree,
    id: NodeId,
}

const ROOT: NodeId = 0;
const INDENT_WIDTH: usize = 2;

impl LineTree {
    /// Build the tree from non-blank lines, two spaces per level.
    pub fn build<S: AsRef<str>>(lines: &[S]) -> Result<Self, CrashError> {
        let mut tree = Self {
            nodes: vec![LineNode {
                content: String::new(),
                children: Vec::new(),
                parent: None,
            }],
        };

        let mut current = ROOT;
        let mut current_level: isize = -1;

        for (i, raw) in lines.iter().enumerate() {
            let line_no = i + 1;
            let raw = raw.as_ref();
            let content = raw.trim_start_matches(' ');
            let leading = raw.len() - content.len();

            if content.trim().is_empty() {
                return Err(malformed(line_no, "line has no content"));
            }
            if leading % INDENT_WIDTH != 0 {
                return Err(malformed(
                    line_no,
                    &format!("odd indentation of {leading} spaces"),
                ));
            }

            let level = (leading / INDENT_WIDTH) as isize;
            let parent = if level == 0 {
                ROOT
            } else if level == current_level {
                tree.parent_of(current, line_no)?
            } else if level == current_level + 1 {
                current
            } else if level < current_level {
                while current_level > level {
                    current = tree.parent_of(current, line_no)?;
                    current_level -= 1;
                }
                tree.parent_of(current, line_no)?
            } else {
                return Err(malformed(
                    line_no,
                    &format!("indentation jumps from level {current_level} to {level}"),
                ));
            };

            let id = tree.nodes.len();
            tree.nodes.push(LineNode {
                content: content.trim_end().to_string(),
                children: Vec::new(),
                parent: Some(parent),
            });
            tree.nodes[parent].children.push(id);

            current = id;
            current_level = level;
        }

        Ok(tree)
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(ROOT)
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn parent_of(&self, id: NodeId, line_no: usize) -> Result<NodeId, CrashError> {
        self.nodes[id]
            .parent
            .ok_or_else(|| malformed(line_no, "dedent past the root"))
    }
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn content(&self) -> &'a str {
        &self.tree.nodes[self.id].content
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.nodes[self.id]
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn has_children(&self) -> bool {
        !self.tree.nodes[self.id].children.is_empty()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.tree.nodes[self.id].parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    /// Depth below the root; top-level lines are depth 0.
    pub fn depth(&self) -> Option<usize> {
        let mut depth = 0;
        let mut node = self.parent()?;
        while let Some(parent) = node.parent() {
            depth += 1;
            node = parent;
        }
        Some(depth)
    }

    /// Pre-order walk of everything below this node.
    pub fn descendants(&self) -> Vec<NodeRef<'a>> {
        let tree = self.tree;
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = tree.nodes[self.id].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            stack.extend(tree.nodes[id].children.iter().rev().copied());
            out.push(NodeRef { tree, id });
        }
        out
    }
}

fn malformed(line: usize, reason: &str) -> CrashError {
    CrashError::MalformedIndentation {
        line,
        reason: reason.to_string(),
    }
}
