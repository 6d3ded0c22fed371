//! Static single assignment numbering over a [`ControlFlowGraph`].
//!
//! Registers and `sp`-relative stack slots are versioned; `zero` and `sp`
//! are not. Phis are placed on the iterated dominance frontier of each
//! location's definitions and kept only where the location is live. Version
//! numbers are handed out in reverse postorder starting at 1, so they grow
//! along every acyclic path from the entry; version 0 is the entry value.

mod schedule;

use std::collections::{BTreeMap, BTreeSet};

use mdec_cfg::{BlockId, ControlFlowGraph, DominatorTree};
use mdec_ir::{Location, VersionedLocation};
use mdec_types::Function;
use rustc_hash::FxHashMap;
use tracing::debug;

pub use schedule::{
    Effect, StackFrame, Step, argument_locations, block_effects, callee_config, execution_order,
    is_tracked, stack_adjustment,
};

/// Where a version is defined.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DefSite {
    /// Version 0: the value on entry.
    Entry,
    Phi(BlockId),
    /// The instruction at this address.
    Instruction(u32),
}

/// `location_dest = phi(location_src...)` at the top of a block.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Phi {
    pub location: Location,
    pub dest: u32,
    /// One source per predecessor reached during renaming.
    pub sources: Vec<(BlockId, u32)>,
}

impl Phi {
    pub const fn dest(&self) -> VersionedLocation {
        VersionedLocation::new(self.location, self.dest)
    }
}

#[derive(Clone, Debug)]
pub struct SsaForm {
    frame: StackFrame,
    effects: Vec<Vec<Effect>>,
    phis: Vec<Vec<Phi>>,
    uses: FxHashMap<(u32, Location), u32>,
    /// Reads of call, return and tail call steps, after the delay slot.
    transfer_uses: FxHashMap<(u32, Location), u32>,
    defs: FxHashMap<(u32, Location), u32>,
    def_sites: FxHashMap<VersionedLocation, DefSite>,
    class_of: FxHashMap<VersionedLocation, usize>,
    classes: Vec<Vec<VersionedLocation>>,
    rpo: Vec<usize>,
}

/// Upward-exposed reads and kills of one block.
fn local_sets(effects: &[Effect]) -> (BTreeSet<Location>, BTreeSet<Location>) {
    let mut exposed = BTreeSet::new();
    let mut killed = BTreeSet::new();
    for effect in effects {
        for loc in &effect.reads {
            if !killed.contains(loc) {
                exposed.insert(*loc);
            }
        }
        killed.extend(effect.writes.iter().copied());
    }
    (exposed, killed)
}

fn live_in(
    successors: &[Vec<usize>],
    rpo: &[usize],
    exposed: &[BTreeSet<Location>],
    killed: &[BTreeSet<Location>],
) -> Vec<BTreeSet<Location>> {
    let mut live_in = exposed.to_vec();
    let mut changed = true;
    while changed {
        changed = false;
        for &block in rpo.iter().rev() {
            let mut live: BTreeSet<Location> = successors[block]
                .iter()
                .flat_map(|&succ| live_in[succ].iter().copied())
                .collect();
            live.retain(|loc| !killed[block].contains(loc));
            live.extend(exposed[block].iter().copied());
            if live != live_in[block] {
                live_in[block] = live;
                changed = true;
            }
        }
    }
    live_in
}

/// Dominator-tree walk binding reads to reaching versions.
struct Renamer<'a> {
    effects: &'a [Vec<Effect>],
    successors: &'a [Vec<usize>],
    children: &'a [Vec<usize>],
    defs: &'a FxHashMap<(u32, Location), u32>,
    phis: &'a mut [Vec<Phi>],
    uses: FxHashMap<(u32, Location), u32>,
    transfer_uses: FxHashMap<(u32, Location), u32>,
    stacks: FxHashMap<Location, Vec<u32>>,
}

impl Renamer<'_> {
    fn top(&self, loc: Location) -> u32 {
        self.stacks
            .get(&loc)
            .and_then(|stack| stack.last().copied())
            .unwrap_or(0)
    }

    fn push(&mut self, loc: Location, version: u32, pushed: &mut Vec<Location>) {
        self.stacks.entry(loc).or_default().push(version);
        pushed.push(loc);
    }

    fn visit(&mut self, block: usize) {
        let mut pushed = Vec::new();
        let dests: Vec<(Location, u32)> = self.phis[block]
            .iter()
            .map(|phi| (phi.location, phi.dest))
            .collect();
        for (loc, version) in dests {
            self.push(loc, version, &mut pushed);
        }
        let effects = self.effects;
        for effect in &effects[block] {
            for &loc in &effect.reads {
                let version = self.top(loc);
                let uses = match effect.step {
                    Step::Transfer(_) => &mut self.transfer_uses,
                    Step::Instruction(_) | Step::Condition(_) => &mut self.uses,
                };
                uses.insert((effect.address, loc), version);
            }
            for &loc in &effect.writes {
                if let Some(&version) = self.defs.get(&(effect.address, loc)) {
                    self.push(loc, version, &mut pushed);
                }
            }
        }
        let successors = self.successors;
        for &succ in &successors[block] {
            let sources: Vec<u32> = self.phis[succ]
                .iter()
                .map(|phi| self.top(phi.location))
                .collect();
            for (phi, version) in self.phis[succ].iter_mut().zip(sources) {
                phi.sources.push((BlockId(block), version));
            }
        }
        let children = self.children;
        for &child in &children[block] {
            self.visit(child);
        }
        for loc in pushed {
            if let Some(stack) = self.stacks.get_mut(&loc) {
                stack.pop();
            }
        }
    }
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

/// Union-find over phi webs.
fn congruence_classes(
    phis: &[Vec<Phi>],
) -> (FxHashMap<VersionedLocation, usize>, Vec<Vec<VersionedLocation>>) {
    let mut index: FxHashMap<VersionedLocation, usize> = FxHashMap::default();
    let mut parent: Vec<usize> = Vec::new();
    let mut nodes: Vec<VersionedLocation> = Vec::new();

    let mut id = |vloc: VersionedLocation, parent: &mut Vec<usize>| {
        *index.entry(vloc).or_insert_with(|| {
            parent.push(parent.len());
            nodes.push(vloc);
            parent.len() - 1
        })
    };

    let mut unions = Vec::new();
    for phi in phis.iter().flatten() {
        let dest = id(phi.dest(), &mut parent);
        for &(_, version) in &phi.sources {
            let source = id(VersionedLocation::new(phi.location, version), &mut parent);
            unions.push((dest, source));
        }
    }
    for (a, b) in unions {
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent[rb] = ra;
        }
    }

    let mut root_class: FxHashMap<usize, usize> = FxHashMap::default();
    let mut classes: Vec<Vec<VersionedLocation>> = Vec::new();
    let mut class_of = FxHashMap::default();
    for (node, vloc) in nodes.iter().enumerate() {
        let root = find(&mut parent, node);
        let class = *root_class.entry(root).or_insert_with(|| {
            classes.push(Vec::new());
            classes.len() - 1
        });
        classes[class].push(*vloc);
        class_of.insert(*vloc, class);
    }
    for class in &mut classes {
        class.sort();
    }
    (class_of, classes)
}

impl SsaForm {
    /// Number every definition in `cfg` and bind every read. `function`
    /// supplies the return register read at returns.
    pub fn build(cfg: &ControlFlowGraph, function: &Function) -> Self {
        let dom = cfg.dominators();
        let rpo = dom.reverse_postorder().to_vec();
        let successors = cfg.successor_lists();
        let frame = StackFrame::analyze(cfg, &rpo);
        let effects: Vec<Vec<Effect>> = cfg
            .blocks()
            .iter()
            .map(|block| block_effects(block, &frame, function))
            .collect();

        let (exposed, killed): (Vec<_>, Vec<_>) =
            effects.iter().map(|effects| local_sets(effects)).unzip();
        let live = live_in(&successors, &rpo, &exposed, &killed);
        let mut phis = place_phis(cfg, &dom, &successors, &killed, &live);

        let mut next: FxHashMap<Location, u32> = FxHashMap::default();
        let mut bump = |loc: Location| {
            let version = next.entry(loc).or_insert(0);
            *version += 1;
            *version
        };
        let mut defs = FxHashMap::default();
        let mut def_sites = FxHashMap::default();
        for &block in &rpo {
            for phi in &mut phis[block] {
                phi.dest = bump(phi.location);
                def_sites.insert(phi.dest(), DefSite::Phi(BlockId(block)));
            }
            for effect in &effects[block] {
                for &loc in &effect.writes {
                    let version = bump(loc);
                    defs.insert((effect.address, loc), version);
                    def_sites.insert(
                        VersionedLocation::new(loc, version),
                        DefSite::Instruction(effect.address),
                    );
                }
            }
        }

        let children = dom.children();
        let mut renamer = Renamer {
            effects: &effects,
            successors: &successors,
            children: &children,
            defs: &defs,
            phis: &mut phis,
            uses: FxHashMap::default(),
            transfer_uses: FxHashMap::default(),
            stacks: FxHashMap::default(),
        };
        renamer.visit(cfg.entry().0);
        let (uses, transfer_uses) = (renamer.uses, renamer.transfer_uses);

        let (class_of, classes) = congruence_classes(&phis);
        debug!(
            definitions = def_sites.len(),
            phis = phis.iter().map(Vec::len).sum::<usize>(),
            webs = classes.len(),
            frame = frame.size(),
            "built ssa"
        );
        Self {
            frame,
            effects,
            phis,
            uses,
            transfer_uses,
            defs,
            def_sites,
            class_of,
            classes,
            rpo,
        }
    }

    pub const fn frame(&self) -> &StackFrame {
        &self.frame
    }

    pub fn effects(&self, block: BlockId) -> &[Effect] {
        &self.effects[block.0]
    }

    pub fn phis(&self, block: BlockId) -> &[Phi] {
        &self.phis[block.0]
    }

    /// Blocks reachable from the entry, in reverse postorder.
    pub fn reverse_postorder(&self) -> &[usize] {
        &self.rpo
    }

    /// Version of `location` read by the instruction at `address`. Reads
    /// with no reaching definition see the entry value.
    pub fn use_version(&self, address: u32, location: Location) -> u32 {
        self.uses.get(&(address, location)).copied().unwrap_or(0)
    }

    pub fn read(&self, address: u32, location: Location) -> VersionedLocation {
        VersionedLocation::new(location, self.use_version(address, location))
    }

    /// Version of `location` read by the call, return or tail call effect of
    /// the control instruction at `address`. These reads happen after the
    /// delay slot, unlike the instruction's own operand reads.
    pub fn transfer_use_version(&self, address: u32, location: Location) -> u32 {
        self.transfer_uses
            .get(&(address, location))
            .copied()
            .unwrap_or(0)
    }

    pub fn transfer_read(&self, address: u32, location: Location) -> VersionedLocation {
        VersionedLocation::new(location, self.transfer_use_version(address, location))
    }

    /// Version read by `effect` for `location`.
    pub fn effect_use_version(&self, effect: &Effect, location: Location) -> u32 {
        match effect.step {
            Step::Transfer(_) => self.transfer_use_version(effect.address, location),
            Step::Instruction(_) | Step::Condition(_) => self.use_version(effect.address, location),
        }
    }

    /// Version of `location` written by the instruction at `address`.
    pub fn def_version(&self, address: u32, location: Location) -> Option<u32> {
        self.defs.get(&(address, location)).copied()
    }

    pub fn write(&self, address: u32, location: Location) -> Option<VersionedLocation> {
        self.def_version(address, location)
            .map(|version| VersionedLocation::new(location, version))
    }

    pub fn def_site(&self, vloc: VersionedLocation) -> Option<DefSite> {
        if vloc.version == 0 {
            return Some(DefSite::Entry);
        }
        self.def_sites.get(&vloc).copied()
    }

    /// Every defined version of `location`, ascending, excluding the entry value.
    pub fn versions(&self, location: Location) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .def_sites
            .keys()
            .filter(|vloc| vloc.location == location)
            .map(|vloc| vloc.version)
            .collect();
        versions.sort_unstable();
        versions
    }

    /// Versions joined with `vloc` through phis, including itself.
    pub fn congruence_class(&self, vloc: VersionedLocation) -> Vec<VersionedLocation> {
        self.class_of
            .get(&vloc)
            .map_or_else(|| vec![vloc], |&class| self.classes[class].clone())
    }

    /// Every phi web with more than one member.
    pub fn congruence_classes(&self) -> &[Vec<VersionedLocation>] {
        &self.classes
    }
}

/// Iterated dominance frontier of each location's definition blocks,
/// filtered by liveness.
fn place_phis(
    cfg: &ControlFlowGraph,
    dom: &DominatorTree,
    successors: &[Vec<usize>],
    killed: &[BTreeSet<Location>],
    live: &[BTreeSet<Location>],
) -> Vec<Vec<Phi>> {
    let frontiers = dom.frontiers(successors);
    let mut def_blocks: BTreeMap<Location, Vec<usize>> = BTreeMap::new();
    for (block, kills) in killed.iter().enumerate() {
        if !dom.is_reachable(block) {
            continue;
        }
        for loc in kills {
            def_blocks.entry(*loc).or_default().push(block);
        }
    }

    let mut phis: Vec<Vec<Phi>> = vec![Vec::new(); cfg.len()];
    for (loc, blocks) in def_blocks {
        let mut placed = BTreeSet::new();
        let mut work = blocks;
        while let Some(block) = work.pop() {
            for &frontier in &frontiers[block] {
                if placed.insert(frontier) {
                    work.push(frontier);
                }
            }
        }
        for block in placed {
            if live[block].contains(&loc) {
                phis[block].push(Phi {
                    location: loc,
                    dest: 0,
                    sources: Vec::new(),
                });
            }
        }
    }
    phis
}
