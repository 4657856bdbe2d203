//! Candidate grouping by (platform, canonical title).

use std::collections::HashMap;

use retro_refine_core::ReleaseCandidate;

/// All releases of one game on one platform, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalGroup {
    pub platform: String,
    pub canonical_title: String,
    pub candidates: Vec<ReleaseCandidate>,
}

/// Bucket candidates by (platform, canonical title).
///
/// Groups come out in the order their first member was seen, and members keep
/// their input order.
pub fn group_candidates<I>(candidates: I) -> Vec<CanonicalGroup>
where
    I: IntoIterator<Item = ReleaseCandidate>,
{
    let mut groups: Vec<CanonicalGroup> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for candidate in candidates {
        let key = (
            candidate.platform.clone(),
            candidate.canonical_title.clone(),
        );
        match index.get(&key) {
            Some(&i) => groups[i].candidates.push(candidate),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(CanonicalGroup {
                    platform: key.0,
                    canonical_title: key.1,
                    candidates: vec![candidate],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_refine_core::{Location, OriginKind, ReleaseFlags};

    fn candidate(platform: &str, canonical: &str, seq: usize) -> ReleaseCandidate {
        ReleaseCandidate {
            source_id: "local".into(),
            raw_name: format!("{canonical} {seq}.zip"),
            platform: platform.into(),
            title: canonical.into(),
            canonical_title: canonical.into(),
            regions: vec![],
            languages: vec![],
            revision: 0,
            revision_label: None,
            flags: ReleaseFlags::default(),
            year: None,
            size: None,
            size_exact: false,
            checksum: None,
            origin: OriginKind::Official,
            location: Location::Remote(format!("https://example.com/{seq}")),
            seq,
        }
    }

    #[test]
    fn groups_preserve_first_seen_order() {
        let groups = group_candidates(vec![
            candidate("snes", "zelda", 0),
            candidate("snes", "metroid", 1),
            candidate("snes", "zelda", 2),
            candidate("nes", "zelda", 3),
        ]);

        let keys: Vec<(&str, &str)> = groups
            .iter()
            .map(|g| (g.platform.as_str(), g.canonical_title.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("snes", "zelda"), ("snes", "metroid"), ("nes", "zelda")]
        );

        let seqs: Vec<usize> = groups[0].candidates.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 2]);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_candidates(Vec::new()).is_empty());
    }
}
