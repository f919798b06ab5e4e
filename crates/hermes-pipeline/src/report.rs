//! Assembly reports on unused attributes.

use crate::resolvers::Resolvers;

const INDENT: &str = "  ";

/// A tree of resolvers collected while an assembly is created.
///
/// Every branch opens a child report, so the rendered output shows where in
/// the nesting an attribute is defined without anybody consuming it.
#[derive(Debug, Default)]
pub struct Report {
    name: String,
    resolvers: Resolvers,
    children: Vec<Report>,
}

impl Report {
    /// Creates a named report.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Opens (or reopens) a child report.
    pub fn open(&mut self, name: impl Into<String>) -> &mut Report {
        let name = name.into();
        let index = match self.children.iter().position(|child| child.name == name) {
            Some(index) => index,
            None => {
                self.children.push(Report::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Adds resolvers to report on; later additions replace earlier contexts.
    pub fn add(&mut self, resolvers: &Resolvers) {
        for (name, attributes) in resolvers.contexts() {
            self.resolvers.insert_context(name.clone(), attributes.clone());
        }
    }

    /// Renders the unused attributes, `None` when there is nothing to report.
    pub fn render(&self) -> Option<String> {
        let mut lines = Vec::new();
        self.render_into(0, &mut lines);
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn render_into(&self, depth: usize, lines: &mut Vec<String>) -> bool {
        let indent = INDENT.repeat(depth + 1);
        let mut nested = Vec::new();
        let mut found = false;
        for child in &self.children {
            found |= child.render_into(depth + 1, &mut nested);
        }
        let unused = self.resolvers.unused();
        if unused.is_empty() && !found {
            return false;
        }
        lines.push(format!("{}Unused attributes in {}", INDENT.repeat(depth), self.name));
        lines.extend(unused.into_iter().map(|line| format!("{indent}{line}")));
        lines.extend(nested);
        true
    }
}
