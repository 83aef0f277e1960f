//! Candidate antecedents for the rule list.
//!
//! Antecedents are conjunctions of `{feature=level}` items with at most one
//! level per feature. They are mined level-wise: an itemset is only extended
//! while its support stays above the threshold, and extensions always use a
//! later feature so each conjunction is generated once.

use crate::table::{CategoricalTable, Feature};

/// Fixed-length set of record indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    pub fn zeros(len: usize) -> Self {
        Self {
            words: vec![0; (len + 63) / 64],
            len,
        }
    }

    pub fn ones(len: usize) -> Self {
        let mut bitmap = Self {
            words: vec![u64::MAX; (len + 63) / 64],
            len,
        };
        let tail = len % 64;
        if tail != 0 {
            if let Some(last) = bitmap.words.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
        bitmap
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set(&mut self, i: usize) {
        self.words[i / 64] |= 1u64 << (i % 64);
    }

    pub fn get(&self, i: usize) -> bool {
        self.words[i / 64] & (1u64 << (i % 64)) != 0
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn and(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
            len: self.len,
        }
    }

    pub fn and_not(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & !b)
                .collect(),
            len: self.len,
        }
    }

    /// Number of set bits shared with `other`.
    pub fn count_and(&self, other: &Bitmap) -> usize {
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub feature: usize,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Antecedent {
    /// Sorted by feature.
    pub items: Vec<Item>,
    /// Training records satisfying every item.
    pub support: Bitmap,
}

impl Antecedent {
    pub fn cardinality(&self) -> usize {
        self.items.len()
    }

    pub fn matches(&self, row: &[u32]) -> bool {
        self.items.iter().all(|item| row[item.feature] == item.level)
    }

    pub fn describe(&self, features: &[Feature]) -> String {
        self.items
            .iter()
            .map(|item| {
                let feature = &features[item.feature];
                format!("{}={}", feature.name, feature.levels[item.level as usize])
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

fn item_bitmaps(table: &CategoricalTable) -> Vec<(Item, Bitmap)> {
    let mut out = Vec::new();
    for (f, feature) in table.features.iter().enumerate() {
        let mut maps = vec![Bitmap::zeros(table.len()); feature.levels.len()];
        for (r, row) in table.rows.iter().enumerate() {
            maps[row[f] as usize].set(r);
        }
        for (level, support) in maps.into_iter().enumerate() {
            out.push((
                Item {
                    feature: f,
                    level: level as u32,
                },
                support,
            ));
        }
    }
    out
}

/// Frequent conjunctions of up to `max_cardinality` items.
pub fn mine(table: &CategoricalTable, min_support: f64, max_cardinality: usize) -> Vec<Antecedent> {
    let min_count = ((min_support * table.len() as f64).ceil() as usize).max(1);
    let items: Vec<(Item, Bitmap)> = item_bitmaps(table)
        .into_iter()
        .filter(|(_, support)| support.count() >= min_count)
        .collect();

    let mut frontier: Vec<Antecedent> = items
        .iter()
        .map(|(item, support)| Antecedent {
            items: vec![*item],
            support: support.clone(),
        })
        .collect();
    let mut mined = frontier.clone();

    for _ in 1..max_cardinality {
        let mut next = Vec::new();
        for antecedent in &frontier {
            let last = antecedent.items[antecedent.items.len() - 1].feature;
            for (item, support) in items.iter().filter(|(item, _)| item.feature > last) {
                let joint = antecedent.support.and(support);
                if joint.count() >= min_count {
                    let mut conj = antecedent.items.clone();
                    conj.push(*item);
                    next.push(Antecedent {
                        items: conj,
                        support: joint,
                    });
                }
            }
        }
        if next.is_empty() {
            break;
        }
        mined.extend(next.iter().cloned());
        frontier = next;
    }
    mined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CategoricalTable {
        CategoricalTable {
            features: vec![
                Feature {
                    name: "a".into(),
                    levels: vec!["0".into(), "1".into()],
                },
                Feature {
                    name: "b".into(),
                    levels: vec!["x".into(), "y".into(), "z".into()],
                },
            ],
            rows: vec![
                vec![0, 0],
                vec![0, 0],
                vec![1, 1],
                vec![1, 1],
                vec![1, 2],
                vec![0, 1],
            ],
            labels: vec![0, 0, 1, 1, 1, 0],
        }
    }

    #[test]
    fn bitmap_ops() {
        let mut a = Bitmap::zeros(130);
        a.set(0);
        a.set(64);
        a.set(129);
        let all = Bitmap::ones(130);
        assert_eq!(all.count(), 130);
        assert_eq!(a.count(), 3);
        assert!(a.get(129) && !a.get(128));
        assert_eq!(all.and_not(&a).count(), 127);
        assert_eq!(all.count_and(&a), 3);
    }

    #[test]
    fn mines_frequent_pairs_only() {
        let mined = mine(&table(), 0.3, 2);
        let singles: Vec<&Antecedent> = mined.iter().filter(|a| a.cardinality() == 1).collect();
        // b=z appears once and is dropped
        assert_eq!(singles.len(), 4);
        let pairs: Vec<&Antecedent> = mined.iter().filter(|a| a.cardinality() == 2).collect();
        assert_eq!(pairs.len(), 2);
        let features = table().features;
        let names: Vec<String> = pairs.iter().map(|a| a.describe(&features)).collect();
        assert!(names.contains(&"a=0 AND b=x".to_string()));
        assert!(names.contains(&"a=1 AND b=y".to_string()));
    }

    #[test]
    fn support_matches_rows() {
        let t = table();
        for antecedent in mine(&t, 0.0, 2) {
            for (r, row) in t.rows.iter().enumerate() {
                assert_eq!(antecedent.matches(row), antecedent.support.get(r));
            }
        }
    }
}
