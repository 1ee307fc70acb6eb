//! Grouping composite: a path prefix over an ordered list of child nodes.

use super::Endpoint;
use crate::routing::{literal_segments, PathSegment, RouteAccumulator};

/// Registers each child under the group's prefix, in declaration order.
pub struct Group {
    prefix: Vec<PathSegment>,
    content: Vec<Box<dyn Endpoint>>,
}

impl Group {
    pub fn new(path: &str) -> Self {
        Group {
            prefix: literal_segments(path),
            content: Vec::new(),
        }
    }

    pub fn mount(mut self, node: impl Endpoint) -> Self {
        self.content.push(Box::new(node));
        self
    }
}

impl Endpoint for Group {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        let n = routes.push_prefix(self.prefix);
        for child in self.content {
            child.register(routes);
        }
        routes.pop_prefix(n);
    }
}
