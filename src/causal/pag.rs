use std::fmt;

use serde::Serialize;

/// Endpoint mark of a PAG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mark {
    Circle,
    Arrow,
    Tail,
}

impl Mark {
    fn dot(self) -> &'static str {
        match self {
            Mark::Circle => "odot",
            Mark::Arrow => "normal",
            Mark::Tail => "none",
        }
    }
}

/// Partial ancestral graph. `marks[i][j]` is the mark at `j` on the edge
/// between `i` and `j`, or `None` when the two are not adjacent.
#[derive(Debug, Clone, PartialEq)]
pub struct Pag {
    names: Vec<String>,
    marks: Vec<Vec<Option<Mark>>>,
}

impl Pag {
    /// No edges.
    pub fn empty(names: Vec<String>) -> Self {
        let n = names.len();
        Self {
            names,
            marks: vec![vec![None; n]; n],
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.marks[a][b] = Some(Mark::Circle);
        self.marks[b][a] = Some(Mark::Circle);
    }

    pub fn remove_edge(&mut self, a: usize, b: usize) {
        self.marks[a][b] = None;
        self.marks[b][a] = None;
    }

    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        self.marks[a][b].is_some()
    }

    pub fn adjacent(&self, a: usize) -> Vec<usize> {
        (0..self.len()).filter(|b| self.is_adjacent(a, *b)).collect()
    }

    /// Mark at `b` on the edge `a *-* b`.
    pub fn mark(&self, a: usize, b: usize) -> Option<Mark> {
        self.marks[a][b]
    }

    pub fn set_mark(&mut self, a: usize, b: usize, mark: Mark) {
        if self.marks[a][b].is_some() {
            self.marks[a][b] = Some(mark);
        }
    }

    pub fn is(&self, a: usize, b: usize, mark: Mark) -> bool {
        self.marks[a][b] == Some(mark)
    }

    /// `a → b`.
    pub fn is_directed(&self, a: usize, b: usize) -> bool {
        self.is(a, b, Mark::Arrow) && self.is(b, a, Mark::Tail)
    }

    /// Reset every endpoint to a circle.
    pub fn reset_marks(&mut self) {
        for row in &mut self.marks {
            for mark in row.iter_mut().flatten() {
                *mark = Mark::Circle;
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges().len()
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for a in 0..self.len() {
            for b in (a + 1)..self.len() {
                if let (Some(at_a), Some(at_b)) = (self.marks[b][a], self.marks[a][b]) {
                    edges.push(Edge {
                        from: self.names[a].clone(),
                        to: self.names[b].clone(),
                        from_mark: at_a,
                        to_mark: at_b,
                    });
                }
            }
        }
        edges
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<Edge> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(Edge {
            from: a.to_string(),
            to: b.to_string(),
            from_mark: self.marks[j][i]?,
            to_mark: self.marks[i][j]?,
        })
    }

    /// Graphviz rendering with both endpoint marks drawn.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pag {\n");
        for name in &self.names {
            out.push_str(&format!("  \"{}\";\n", name));
        }
        for edge in self.edges() {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [dir=both, arrowtail={}, arrowhead={}];\n",
                edge.from,
                edge.to,
                edge.from_mark.dot(),
                edge.to_mark.dot()
            ));
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub from_mark: Mark,
    pub to_mark: Mark,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = match self.from_mark {
            Mark::Circle => "o",
            Mark::Arrow => "<",
            Mark::Tail => "-",
        };
        let right = match self.to_mark {
            Mark::Circle => "o",
            Mark::Arrow => ">",
            Mark::Tail => "-",
        };
        write!(f, "{} {}-{} {}", self.from, left, right, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pag() -> Pag {
        let mut pag = Pag::empty(vec!["a".into(), "b".into(), "c".into()]);
        pag.add_edge(0, 1);
        pag.add_edge(1, 2);
        pag
    }

    #[test]
    fn edge_text_shows_both_marks() {
        let mut pag = pag();
        pag.set_mark(0, 1, Mark::Arrow);
        pag.set_mark(2, 1, Mark::Arrow);
        pag.set_mark(1, 2, Mark::Arrow);
        let edges: Vec<String> = pag.edges().iter().map(|e| e.to_string()).collect();
        assert_eq!(edges, vec!["a o-> b", "b <-> c"]);

        pag.set_mark(1, 0, Mark::Tail);
        assert!(pag.is_directed(0, 1));
        assert_eq!(pag.edge("a", "b").unwrap().to_string(), "a --> b");
        assert_eq!(pag.edge("b", "a").unwrap().to_string(), "b <-- a");
    }

    #[test]
    fn marks_need_an_edge() {
        let mut pag = pag();
        pag.set_mark(0, 2, Mark::Arrow);
        assert!(!pag.is_adjacent(0, 2));
        pag.remove_edge(0, 1);
        assert_eq!(pag.adjacent(1), vec![2]);
        assert_eq!(pag.edge_count(), 1);
    }

    #[test]
    fn reset_restores_circles() {
        let mut pag = pag();
        pag.set_mark(0, 1, Mark::Arrow);
        pag.reset_marks();
        assert_eq!(pag.edge("a", "b").unwrap().to_string(), "a o-o b");
    }

    #[test]
    fn dot_lists_nodes_and_edges() {
        let dot = pag().to_dot();
        assert!(dot.starts_with("digraph pag {"));
        assert!(dot.contains("\"a\" -> \"b\" [dir=both, arrowtail=odot, arrowhead=odot];"));
        assert_eq!(dot.matches("->").count(), 2);
    }
}
