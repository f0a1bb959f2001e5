//! Link graph traversal for component requests

use ahash::AHashMap;
use lv_core::{ComponentId, LinkId};
use ndarray::ArrayD;

use crate::collection::DataCollection;
use crate::data::Data;
use crate::link::ComponentLink;
use crate::view::View;
use crate::Result;

#[derive(Debug, Clone, Copy)]
enum Origin {
    Local,
    External(LinkId),
}

struct Candidate {
    origin: Origin,
    link: ComponentLink,
}

/// Smallest derivation height of a component and the link achieving it
#[derive(Debug, Clone, Copy)]
struct Rank {
    height: usize,
    via: usize,
}

/// Links and components on the current derivation path
#[derive(Default)]
struct Path {
    links: Vec<usize>,
    components: Vec<ComponentId>,
}

/// Resolves component ids on one dataset through the links known to a
/// collection.
///
/// Candidates are the dataset's own links followed by the collection's links
/// in declaration order. Every derivable component is ranked up front by the
/// height of its shortest derivation tree, so a request is answered in one
/// pass: only links whose inputs fit the remaining hop budget are tried, and
/// the first of them always succeeds.
pub(crate) struct Resolver<'a> {
    collection: &'a DataCollection,
    data: &'a Data,
    candidates: Vec<Candidate>,
    ranks: AHashMap<ComponentId, Rank>,
    max_depth: usize,
    prefer_direct: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(collection: &'a DataCollection, data: &'a Data) -> Self {
        let local = data.local_links().iter().cloned().map(|link| Candidate {
            origin: Origin::Local,
            link,
        });
        let external = collection.external_links().flat_map(|(id, link)| {
            link.component_links().into_iter().map(move |link| Candidate {
                origin: Origin::External(id),
                link,
            })
        });
        let candidates: Vec<Candidate> = local.chain(external).collect();

        let settings = &collection.settings().resolution;
        let max_depth = settings
            .max_link_hops
            .map_or(candidates.len(), |hops| hops.min(candidates.len()));

        let ranks = rank_components(data, &candidates);
        tracing::trace!(
            "Ranked {} derivable components over {} links on '{}'",
            ranks.len(),
            candidates.len(),
            data.label()
        );

        Self {
            collection,
            data,
            candidates,
            ranks,
            max_depth,
            prefer_direct: settings.prefer_direct_links,
        }
    }

    /// Values of `target` as observed on the resolver's dataset
    pub fn resolve(&self, target: ComponentId, view: Option<&View>) -> Result<ArrayD<f64>> {
        if !self.can_resolve(target) {
            tracing::debug!("No link chain produces {} on '{}'", target, self.data.label());
            return Err(self.collection.incompatible(target, self.data.id()));
        }
        let mut path = Path::default();
        self.resolve_inner(target, view, &mut path, self.max_depth)
    }

    /// Whether some derivation path exists, without computing values
    pub fn can_resolve(&self, target: ComponentId) -> bool {
        self.height(target).is_some_and(|height| height <= self.max_depth)
    }

    fn height(&self, cid: ComponentId) -> Option<usize> {
        if self.data.has_native(cid) {
            return Some(0);
        }
        self.ranks.get(&cid).map(|rank| rank.height)
    }

    fn resolve_inner(
        &self,
        target: ComponentId,
        view: Option<&View>,
        path: &mut Path,
        budget: usize,
    ) -> Result<ArrayD<f64>> {
        if let Some(values) = self.data.native_values(target, view)? {
            return Ok(values);
        }

        for index in self.plan(target, path, budget) {
            let candidate = &self.candidates[index];
            tracing::trace!(
                "Trying {:?} link {:?} for {} on '{}'",
                candidate.origin,
                candidate.link.description(),
                target,
                self.data.label()
            );

            path.links.push(index);
            path.components.push(target);
            let inputs: Result<Vec<ArrayD<f64>>> = candidate
                .link
                .from_ids()
                .into_iter()
                .map(|cid| self.resolve_inner(cid, view, path, budget - 1))
                .collect();
            path.components.pop();
            path.links.pop();

            match inputs {
                Ok(inputs) => return candidate.link.compute(&inputs),
                Err(e) if e.is_incompatible_attribute() => continue,
                Err(e) => return Err(e),
            }
        }

        tracing::debug!("No link chain produces {} on '{}'", target, self.data.label());
        Err(self.collection.incompatible(target, self.data.id()))
    }

    /// Links to try for `target` within `budget` hops, in preference order.
    /// The ranked link closes the list so an off-path derivation is always
    /// available when `target` fits the budget.
    fn plan(&self, target: ComponentId, path: &Path, budget: usize) -> Vec<usize> {
        if budget == 0 {
            return Vec::new();
        }
        let fits = |cid: &ComponentId| self.height(*cid).is_some_and(|height| height < budget);

        let mut plan: Vec<usize> = self
            .ordered_candidates(target)
            .into_iter()
            .filter(|index| {
                let inputs = self.candidates[*index].link.from_ids();
                !path.links.contains(index)
                    && inputs.iter().all(|cid| !path.components.contains(cid) && fits(cid))
            })
            .collect();

        if let Some(rank) = self.ranks.get(&target) {
            if rank.height <= budget && !plan.contains(&rank.via) {
                plan.push(rank.via);
            }
        }
        plan
    }

    /// Links producing `target`. Links whose inputs are all stored on the
    /// dataset come first, otherwise declaration order is kept.
    fn ordered_candidates(&self, target: ComponentId) -> Vec<usize> {
        let mut matching: Vec<usize> = self
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.link.to_id() == target)
            .map(|(index, _)| index)
            .collect();

        if self.prefer_direct {
            // stable: ties keep declaration order
            matching.sort_by_key(|index| {
                let direct = self.candidates[*index]
                    .link
                    .from_ids()
                    .iter()
                    .all(|cid| self.data.has_native(*cid));
                !direct
            });
        }
        matching
    }
}

/// Shortest derivation height of every component the links can produce on
/// `data`. Native components have height zero and are not listed. Heights
/// only decrease between rounds, so the loop settles after at most one round
/// per link.
fn rank_components(data: &Data, candidates: &[Candidate]) -> AHashMap<ComponentId, Rank> {
    let mut ranks: AHashMap<ComponentId, Rank> = AHashMap::new();
    loop {
        let mut changed = false;
        for (via, candidate) in candidates.iter().enumerate() {
            let output = candidate.link.to_id();
            if data.has_native(output) {
                continue;
            }
            let mut height = Some(1);
            for cid in candidate.link.from_ids() {
                let input = if data.has_native(cid) {
                    Some(0)
                } else {
                    ranks.get(&cid).map(|rank| rank.height)
                };
                height = match (height, input) {
                    (Some(h), Some(input)) => Some(h.max(input + 1)),
                    _ => None,
                };
            }
            let Some(height) = height else { continue };
            if ranks.get(&output).map_or(true, |rank| height < rank.height) {
                ranks.insert(output, Rank { height, via });
                changed = true;
            }
        }
        if !changed {
            return ranks;
        }
    }
}
