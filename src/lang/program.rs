use super::node::TopLevel;

/// A parsed script file: its top-level items in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub items: Vec<TopLevel>,
}

impl Program {
    pub fn new(items: Vec<TopLevel>) -> Self {
        Program { items }
    }
}
