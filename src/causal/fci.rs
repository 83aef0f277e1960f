//! Fast Causal Inference.
//!
//! 1. Stable adjacency search: at each conditioning-set size the
//!    adjacencies are frozen before testing, so the skeleton does not depend
//!    on the order pairs are visited.
//! 2. Unshielded colliders (R0).
//! 3. Possible-D-SEP: edges are tested again against subsets of the nodes
//!    reachable through colliders or triangles.
//! 4. Marks are reset, background knowledge and R0 applied again, then
//!    Zhang's rules R1–R4 and R8–R10 run to a fixpoint. Selection-bias
//!    rules R5–R7 are not used.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::{debug, info};

use super::independence::GSquareTest;
use super::knowledge::Knowledge;
use super::pag::{Mark, Pag};
use super::Dataset;
use crate::config::FciConfig;
use crate::error::{PipelineError, Result};

type SepSets = BTreeMap<(usize, usize), Vec<usize>>;

fn key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

#[derive(Debug, Clone)]
pub struct FciResult {
    pub pag: Pag,
    /// Independence tests performed.
    pub tests: usize,
    pub skeleton_edges: usize,
    pub removed_by_pds: usize,
}

pub fn learn(data: &Dataset, config: &FciConfig) -> Result<FciResult> {
    if data.variables() < 2 || data.is_empty() {
        return Err(PipelineError::Empty(format!(
            "FCI needs at least two variables and one record, got {} x {}",
            data.variables(),
            data.len()
        )));
    }
    let knowledge = Knowledge::resolve(&config.knowledge, &data.names)?;
    let test = GSquareTest::new(data, config.alpha);

    let mut pag = Pag::empty(data.names.clone());
    for a in 0..pag.len() {
        for b in (a + 1)..pag.len() {
            if !knowledge.is_forbidden(a, b) {
                pag.add_edge(a, b);
            }
        }
    }

    let mut sepsets = SepSets::new();
    skeleton(&test, &knowledge, config.max_depth, &mut pag, &mut sepsets);
    let skeleton_edges = pag.edge_count();
    debug!("skeleton: {} edges after {} tests", skeleton_edges, test.performed());

    knowledge.orient(&mut pag);
    orient_colliders(&mut pag, &sepsets);
    let removed_by_pds =
        possible_dsep_step(&test, &knowledge, config.max_pds_depth, &mut pag, &mut sepsets);

    pag.reset_marks();
    knowledge.orient(&mut pag);
    orient_colliders(&mut pag, &sepsets);
    apply_rules(&mut pag, &sepsets);

    info!(
        "FCI: {} variables, {} edges ({} removed by possible-D-SEP), {} tests",
        pag.len(),
        pag.edge_count(),
        removed_by_pds,
        test.performed()
    );
    Ok(FciResult {
        pag,
        tests: test.performed(),
        skeleton_edges,
        removed_by_pds,
    })
}

fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![vec![]];
    }
    if items.len() < k {
        return vec![];
    }
    let mut result = Vec::new();
    for (idx, &item) in items.iter().enumerate() {
        for mut sub in combinations(&items[idx + 1..], k - 1) {
            sub.insert(0, item);
            result.push(sub);
        }
    }
    result
}

fn skeleton(
    test: &GSquareTest,
    knowledge: &Knowledge,
    max_depth: Option<usize>,
    pag: &mut Pag,
    sepsets: &mut SepSets,
) {
    let n = pag.len();
    let mut depth = 0;
    loop {
        let frozen: Vec<Vec<usize>> = (0..n).map(|v| pag.adjacent(v)).collect();
        if frozen.iter().all(|adj| adj.len() <= depth) {
            break;
        }
        for x in 0..n {
            for &y in frozen[x].iter().filter(|y| **y > x) {
                if !pag.is_adjacent(x, y) || knowledge.is_required(x, y) {
                    continue;
                }
                'sides: for &(from, other) in &[(x, y), (y, x)] {
                    let candidates: Vec<usize> =
                        frozen[from].iter().copied().filter(|v| *v != other).collect();
                    for subset in combinations(&candidates, depth) {
                        if test.independent(x, y, &subset) {
                            pag.remove_edge(x, y);
                            sepsets.insert(key(x, y), subset);
                            break 'sides;
                        }
                    }
                }
            }
        }
        depth += 1;
        if max_depth.map_or(false, |max| depth > max) {
            break;
        }
    }
}

/// `a *→ c ←* b` for every unshielded triple whose separating set omits `c`.
/// Pairs without a recorded separating set (forbidden pairs) are skipped.
fn orient_colliders(pag: &mut Pag, sepsets: &SepSets) {
    let mut colliders = Vec::new();
    for c in 0..pag.len() {
        let adj = pag.adjacent(c);
        for (i, &a) in adj.iter().enumerate() {
            for &b in &adj[i + 1..] {
                if pag.is_adjacent(a, b) {
                    continue;
                }
                if let Some(sepset) = sepsets.get(&key(a, b)) {
                    if !sepset.contains(&c) {
                        colliders.push((a, c, b));
                    }
                }
            }
        }
    }
    for (a, c, b) in colliders {
        orient_circle(pag, a, c, Mark::Arrow);
        orient_circle(pag, b, c, Mark::Arrow);
    }
}

/// Nodes reachable from `x` along paths whose every inner node is a
/// collider or sits in a triangle with its path neighbours.
fn possible_dsep(pag: &Pag, x: usize) -> BTreeSet<usize> {
    let mut reached = BTreeSet::new();
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();
    for v in pag.adjacent(x) {
        reached.insert(v);
        seen.insert((x, v));
        queue.push_back((x, v));
    }
    while let Some((a, b)) = queue.pop_front() {
        for c in pag.adjacent(b) {
            if c == a || c == x {
                continue;
            }
            let collider = pag.is(a, b, Mark::Arrow) && pag.is(c, b, Mark::Arrow);
            if (collider || pag.is_adjacent(a, c)) && seen.insert((b, c)) {
                reached.insert(c);
                queue.push_back((b, c));
            }
        }
    }
    reached
}

fn possible_dsep_step(
    test: &GSquareTest,
    knowledge: &Knowledge,
    max_pds_depth: Option<usize>,
    pag: &mut Pag,
    sepsets: &mut SepSets,
) -> usize {
    let n = pag.len();
    let pds: Vec<BTreeSet<usize>> = (0..n).map(|x| possible_dsep(pag, x)).collect();
    let mut removed = 0;
    for x in 0..n {
        for y in pag.adjacent(x).into_iter().filter(|y| *y > x) {
            if knowledge.is_required(x, y) {
                continue;
            }
            'sides: for &(from, other) in &[(x, y), (y, x)] {
                let candidates: Vec<usize> = pds[from]
                    .iter()
                    .copied()
                    .filter(|v| *v != other && *v != from)
                    .collect();
                let limit = max_pds_depth
                    .unwrap_or(candidates.len())
                    .min(candidates.len());
                for size in 1..=limit {
                    for subset in combinations(&candidates, size) {
                        if test.independent(x, y, &subset) {
                            debug!(
                                "possible-D-SEP removes {} - {} given {:?}",
                                pag.names()[x],
                                pag.names()[y],
                                subset
                            );
                            pag.remove_edge(x, y);
                            sepsets.insert(key(x, y), subset);
                            removed += 1;
                            break 'sides;
                        }
                    }
                }
            }
        }
    }
    removed
}

/// Set the mark at `b` on `a *-* b` if it is still a circle.
fn orient_circle(pag: &mut Pag, a: usize, b: usize, mark: Mark) -> bool {
    if pag.is(a, b, Mark::Circle) {
        pag.set_mark(a, b, mark);
        true
    } else {
        false
    }
}

fn apply_rules(pag: &mut Pag, sepsets: &SepSets) {
    loop {
        let mut changed = false;
        changed |= rule1(pag);
        changed |= rule2(pag);
        changed |= rule3(pag);
        changed |= rule4(pag, sepsets);
        changed |= rule8(pag);
        changed |= rule9(pag);
        changed |= rule10(pag);
        if !changed {
            break;
        }
    }
}

/// `a *→ b o-* c`, `a`, `c` not adjacent ⇒ `b → c`.
fn rule1(pag: &mut Pag) -> bool {
    let mut changed = false;
    for b in 0..pag.len() {
        let adj = pag.adjacent(b);
        for &a in &adj {
            if !pag.is(a, b, Mark::Arrow) {
                continue;
            }
            for &c in &adj {
                if c == a || pag.is_adjacent(a, c) || !pag.is(c, b, Mark::Circle) {
                    continue;
                }
                pag.set_mark(c, b, Mark::Tail);
                orient_circle(pag, b, c, Mark::Arrow);
                changed = true;
            }
        }
    }
    changed
}

/// `a → b *→ c` or `a *→ b → c`, with `a *-o c` ⇒ `a *→ c`.
fn rule2(pag: &mut Pag) -> bool {
    let mut changed = false;
    for a in 0..pag.len() {
        for c in pag.adjacent(a) {
            if !pag.is(a, c, Mark::Circle) {
                continue;
            }
            let via = pag.adjacent(a).into_iter().any(|b| {
                b != c
                    && pag.is_adjacent(b, c)
                    && ((pag.is_directed(a, b) && pag.is(b, c, Mark::Arrow))
                        || (pag.is(a, b, Mark::Arrow) && pag.is_directed(b, c)))
            });
            if via {
                changed |= orient_circle(pag, a, c, Mark::Arrow);
            }
        }
    }
    changed
}

/// `a *→ b ←* c`, `a *-o d o-* c`, `a`, `c` not adjacent, `d *-o b`
/// ⇒ `d *→ b`.
fn rule3(pag: &mut Pag) -> bool {
    let mut changed = false;
    for b in 0..pag.len() {
        let adj = pag.adjacent(b);
        for (i, &a) in adj.iter().enumerate() {
            for &c in &adj[i + 1..] {
                if pag.is_adjacent(a, c)
                    || !pag.is(a, b, Mark::Arrow)
                    || !pag.is(c, b, Mark::Arrow)
                {
                    continue;
                }
                for &d in &adj {
                    if d == a || d == c {
                        continue;
                    }
                    if pag.is(a, d, Mark::Circle)
                        && pag.is(c, d, Mark::Circle)
                        && pag.is(d, b, Mark::Circle)
                    {
                        changed |= orient_circle(pag, d, b, Mark::Arrow);
                    }
                }
            }
        }
    }
    changed
}

/// Start `d` of a discriminating path `<d, ..., a, b, c>` for `b`: every
/// node strictly between `d` and `b` is a collider on the path and a parent
/// of `c`, and `d` is not adjacent to `c`.
fn discriminating_start(pag: &Pag, a: usize, b: usize, c: usize) -> Option<usize> {
    let mut visited: BTreeSet<usize> = vec![a, b, c].into_iter().collect();
    let mut queue = VecDeque::from(vec![a]);
    while let Some(node) = queue.pop_front() {
        for v in pag.adjacent(node) {
            if visited.contains(&v) || !pag.is(v, node, Mark::Arrow) {
                continue;
            }
            if !pag.is_adjacent(v, c) {
                return Some(v);
            }
            if pag.is_directed(v, c) && pag.is(node, v, Mark::Arrow) {
                visited.insert(v);
                queue.push_back(v);
            }
        }
    }
    None
}

/// Discriminating path `<d, ..., a, b, c>` with `b o-* c`: `b → c` when `b`
/// separates `d` and `c`, otherwise `a ↔ b ↔ c`.
fn rule4(pag: &mut Pag, sepsets: &SepSets) -> bool {
    let mut changed = false;
    for b in 0..pag.len() {
        for c in pag.adjacent(b) {
            if !pag.is(c, b, Mark::Circle) {
                continue;
            }
            for a in pag.adjacent(b) {
                if a == c
                    || !pag.is(b, a, Mark::Arrow)
                    || !pag.is_directed(a, c)
                    || !pag.is(c, b, Mark::Circle)
                {
                    continue;
                }
                let Some(d) = discriminating_start(pag, a, b, c) else {
                    continue;
                };
                let Some(sepset) = sepsets.get(&key(d, c)) else {
                    continue;
                };
                if sepset.contains(&b) {
                    orient_circle(pag, c, b, Mark::Tail);
                    orient_circle(pag, b, c, Mark::Arrow);
                } else {
                    orient_circle(pag, a, b, Mark::Arrow);
                    orient_circle(pag, b, c, Mark::Arrow);
                    orient_circle(pag, c, b, Mark::Arrow);
                }
                changed = true;
            }
        }
    }
    changed
}

/// `a o→ c`.
fn is_circle_arrow(pag: &Pag, a: usize, c: usize) -> bool {
    pag.is(c, a, Mark::Circle) && pag.is(a, c, Mark::Arrow)
}

/// `a → b → c` or `a -o b → c`, with `a o→ c` ⇒ `a → c`.
fn rule8(pag: &mut Pag) -> bool {
    let mut changed = false;
    for a in 0..pag.len() {
        for c in pag.adjacent(a) {
            if !is_circle_arrow(pag, a, c) {
                continue;
            }
            let via = pag.adjacent(a).into_iter().any(|b| {
                b != c
                    && pag.is_directed(b, c)
                    && pag.is(b, a, Mark::Tail)
                    && (pag.is(a, b, Mark::Arrow) || pag.is(a, b, Mark::Circle))
            });
            if via {
                changed |= orient_circle(pag, c, a, Mark::Tail);
            }
        }
    }
    changed
}

/// Edge `u *-* v` could be oriented `u → v`.
fn potentially_directed(pag: &Pag, u: usize, v: usize) -> bool {
    matches!(pag.mark(u, v), Some(Mark::Arrow) | Some(Mark::Circle))
        && matches!(pag.mark(v, u), Some(Mark::Tail) | Some(Mark::Circle))
}

/// Whether an uncovered potentially directed path runs from `current`
/// (entered from `prev`) to `target` without visiting `avoid`.
fn uncovered_pd_path(pag: &Pag, prev: usize, current: usize, target: usize, avoid: &[usize]) -> bool {
    let mut seen = BTreeSet::new();
    seen.insert((prev, current));
    let mut stack = vec![(prev, current)];
    while let Some((p, u)) = stack.pop() {
        if u == target {
            return true;
        }
        for v in pag.adjacent(u) {
            if v == p
                || avoid.contains(&v)
                || pag.is_adjacent(p, v)
                || !potentially_directed(pag, u, v)
            {
                continue;
            }
            if seen.insert((u, v)) {
                stack.push((u, v));
            }
        }
    }
    false
}

/// `a o→ c` with an uncovered p.d. path `<a, b, ..., c>`, `b`, `c` not
/// adjacent ⇒ `a → c`.
fn rule9(pag: &mut Pag) -> bool {
    let mut changed = false;
    for a in 0..pag.len() {
        for c in pag.adjacent(a) {
            if !is_circle_arrow(pag, a, c) {
                continue;
            }
            let via = pag.adjacent(a).into_iter().any(|b| {
                b != c
                    && !pag.is_adjacent(b, c)
                    && potentially_directed(pag, a, b)
                    && uncovered_pd_path(pag, a, b, c, &[a])
            });
            if via {
                changed |= orient_circle(pag, c, a, Mark::Tail);
            }
        }
    }
    changed
}

/// Second nodes of uncovered p.d. paths from `a` to `target` avoiding `c`.
fn first_steps(pag: &Pag, a: usize, target: usize, c: usize) -> Vec<usize> {
    pag.adjacent(a)
        .into_iter()
        .filter(|&m| {
            m != c && potentially_directed(pag, a, m) && uncovered_pd_path(pag, a, m, target, &[a, c])
        })
        .collect()
}

/// `a o→ c`, `b → c ← d`, uncovered p.d. paths from `a` to `b` and to `d`
/// whose second nodes differ and are not adjacent ⇒ `a → c`.
fn rule10(pag: &mut Pag) -> bool {
    let mut changed = false;
    for a in 0..pag.len() {
        for c in pag.adjacent(a) {
            if !is_circle_arrow(pag, a, c) {
                continue;
            }
            let parents: Vec<usize> = pag
                .adjacent(c)
                .into_iter()
                .filter(|&p| p != a && pag.is_directed(p, c))
                .collect();
            let mut fired = false;
            'pairs: for (i, &b) in parents.iter().enumerate() {
                let towards_b = first_steps(pag, a, b, c);
                if towards_b.is_empty() {
                    continue;
                }
                for &d in &parents[i + 1..] {
                    for &mu in &towards_b {
                        for omega in first_steps(pag, a, d, c) {
                            if mu != omega && !pag.is_adjacent(mu, omega) {
                                fired = true;
                                break 'pairs;
                            }
                        }
                    }
                }
            }
            if fired {
                changed |= orient_circle(pag, c, a, Mark::Tail);
            }
        }
    }
    changed
}
