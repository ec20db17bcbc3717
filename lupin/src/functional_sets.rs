use crate::common::*;
use crate::network::NetworkNode;
use matrix_util::common_io::read_lines_of_words_delim;

#[derive(Debug, Clone)]
pub struct FunctionalSetArgs {
    pub min_size: usize,
    pub max_size: usize,
}

impl Default for FunctionalSetArgs {
    fn default() -> Self {
        Self {
            min_size: 15,
            max_size: 300,
        }
    }
}

/// A named group of feature ids, e.g. a GO term
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalSet {
    pub name: Box<str>,
    pub description: Option<Box<str>>,
    /// sorted and unique
    pub members: Vec<Box<str>>,
}

impl FunctionalSet {
    pub fn new(name: Box<str>, description: Option<Box<str>>, members: Vec<Box<str>>) -> Self {
        let members: BTreeSet<Box<str>> = members.into_iter().collect();
        Self {
            name,
            description,
            members: members.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members
            .binary_search_by(|m| m.as_ref().cmp(id))
            .is_ok()
    }
}

/// Size-bounded collection of functional sets with a reverse index
#[derive(Debug, Clone, Default)]
pub struct FunctionalSetUniverse {
    sets: Vec<FunctionalSet>,
    /// set indexes per feature id, ascending
    by_feature: HashMap<Box<str>, Vec<usize>>,
}

impl FunctionalSetUniverse {
    /// Keep the sets whose size falls in `[min_size, max_size]`
    pub fn new(sets: Vec<FunctionalSet>, args: &FunctionalSetArgs) -> anyhow::Result<Self> {
        let mut names: HashSet<Box<str>> = HashSet::default();
        for s in &sets {
            if !names.insert(s.name.clone()) {
                return Err(NetworkError::validation(format!(
                    "duplicate functional set: {}",
                    s.name
                )));
            }
        }

        let ntot = sets.len();
        let sets: Vec<FunctionalSet> = sets
            .into_iter()
            .filter(|s| s.len() >= args.min_size && s.len() <= args.max_size)
            .collect();

        if sets.len() < ntot {
            info!(
                "kept {} of {} functional sets with size in [{}, {}]",
                sets.len(),
                ntot,
                args.min_size,
                args.max_size
            );
        }

        let mut by_feature: HashMap<Box<str>, Vec<usize>> = HashMap::default();
        for (k, s) in sets.iter().enumerate() {
            for m in &s.members {
                by_feature.entry(m.clone()).or_default().push(k);
            }
        }

        Ok(Self { sets, by_feature })
    }

    /// GMT: `name<TAB>description<TAB>member...`
    pub fn from_gmt(file: &str, args: &FunctionalSetArgs) -> anyhow::Result<Self> {
        let read_out = read_lines_of_words_delim(file, "\t", -1)?;
        let mut sets = Vec::with_capacity(read_out.lines.len());
        for (i, words) in read_out.lines.into_iter().enumerate() {
            if words.len() < 2 {
                return Err(NetworkError::validation(format!(
                    "{}: line {} needs `name description member...`",
                    file,
                    i + 1
                )));
            }
            let description = match words[1].as_ref() {
                "" | "NA" | "na" => None,
                d => Some(d.into()),
            };
            // trailing tabs leave empty words
            let members: Vec<Box<str>> = words[2..]
                .iter()
                .filter(|w| !w.trim().is_empty())
                .cloned()
                .collect();
            sets.push(FunctionalSet::new(words[0].clone(), description, members));
        }
        info!("read {} functional sets from {}", sets.len(), file);
        Self::new(sets, args)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[FunctionalSet] {
        &self.sets
    }

    pub fn get(&self, k: usize) -> &FunctionalSet {
        &self.sets[k]
    }

    /// Sets containing the feature id
    pub fn sets_of(&self, id: &str) -> &[usize] {
        self.by_feature.get(id).map(|x| x.as_slice()).unwrap_or(&[])
    }

    /// Sets of a node, looked up by id and then by alias
    pub fn sets_of_node(&self, node: &NetworkNode) -> &[usize] {
        let by_id = self.sets_of(&node.id);
        if !by_id.is_empty() {
            return by_id;
        }
        node.alias
            .as_deref()
            .map(|a| self.sets_of(a))
            .unwrap_or(&[])
    }

    /// Whether two sorted set-index lists intersect
    pub fn share_any(a: &[usize], b: &[usize]) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }

    /// Count how many of `nodes` carry any annotation, and warn when
    /// coverage is empty
    pub fn coverage<'a, I>(&self, nodes: I) -> (usize, usize)
    where
        I: IntoIterator<Item = &'a NetworkNode>,
    {
        let mut ntot = 0;
        let mut ncovered = 0;
        for n in nodes {
            ntot += 1;
            if !self.sets_of_node(n).is_empty() {
                ncovered += 1;
            }
        }
        if ncovered == 0 && ntot > 0 {
            warn!("none of {} nodes appear in the functional universe", ntot);
        } else {
            info!("{} of {} nodes have functional annotation", ncovered, ntot);
        }
        (ncovered, ntot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_util::common_io::{create_temp_dir_file, write_lines};

    fn members(prefix: &str, n: usize) -> Vec<Box<str>> {
        (0..n).map(|i| format!("{}{}", prefix, i).into()).collect()
    }

    #[test]
    fn test_size_bounds() -> anyhow::Result<()> {
        let sets = vec![
            FunctionalSet::new("small".into(), None, members("g", 3)),
            FunctionalSet::new("ok".into(), None, members("g", 5)),
            FunctionalSet::new("large".into(), None, members("g", 9)),
        ];
        let args = FunctionalSetArgs {
            min_size: 4,
            max_size: 8,
        };
        let universe = FunctionalSetUniverse::new(sets, &args)?;
        assert_eq!(universe.len(), 1);
        assert_eq!(&*universe.get(0).name, "ok");
        assert_eq!(universe.sets_of("g4"), &[0]);
        assert!(universe.sets_of("g5").is_empty());
        Ok(())
    }

    #[test]
    fn test_read_gmt() -> anyhow::Result<()> {
        let file = create_temp_dir_file(".gmt")?;
        let file = file.to_str().unwrap();
        write_lines(
            &[
                "GO:1\tcell cycle\tA\tB\tC\tB",
                "GO:2\tNA\tC\tD\t",
                "GO:3\ttoo small\tA",
                "GO:4\ttrailing tab\tE\t",
            ],
            file,
        )?;
        let args = FunctionalSetArgs {
            min_size: 2,
            max_size: 10,
        };
        let universe = FunctionalSetUniverse::from_gmt(file, &args)?;
        assert_eq!(universe.len(), 2);
        let expected: Vec<Box<str>> = vec!["A".into(), "B".into(), "C".into()];
        assert_eq!(universe.get(0).members, expected);
        assert_eq!(universe.get(0).description.as_deref(), Some("cell cycle"));
        assert!(universe.get(1).description.is_none());
        assert_eq!(universe.sets_of("C"), &[0, 1]);
        assert!(universe.get(1).contains("D"));
        assert_eq!(universe.get(1).members.len(), 2);
        assert!(universe.sets_of("").is_empty());
        Ok(())
    }

    #[test]
    fn test_share_any() {
        assert!(FunctionalSetUniverse::share_any(&[1, 4, 7], &[2, 7]));
        assert!(!FunctionalSetUniverse::share_any(&[1, 4], &[2, 5]));
        assert!(!FunctionalSetUniverse::share_any(&[], &[2]));
    }
}
