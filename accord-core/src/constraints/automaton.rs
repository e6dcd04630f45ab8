//! Weighted finite-state transducers over the tropical semiring.
//!
//! Weights are costs: paths combine by addition, alternatives by minimum.
//! Label `0` is epsilon. Every machine carries its own `SymbolTable`;
//! composition matches labels through their symbols.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet, VecDeque};

use crate::error::{AccordError, Result};

pub type StateId = usize;
pub type Label = u32;
pub type Weight = f32;

pub const EPSILON: Label = 0;
pub const EPSILON_SYMBOL: &str = "<eps>";

/// Upper bound on the states created by `determinize`.
const MAX_DETERMINIZED_STATES: usize = 100_000;

/// Upper bound on the stack pops of one `paths` enumeration.
const MAX_PATH_VISITS: usize = 1_000_000;

/// Weights closer than this are treated as equal when comparing states.
const WEIGHT_QUANTUM: Weight = 1e-4;

fn quantize(weight: Weight) -> i64 {
	(weight / WEIGHT_QUANTUM).round() as i64
}

/// Bidirectional symbol ↔ label mapping. `<eps>` is always label 0.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolTable {
	symbols: Vec<String>,
	ids: HashMap<String, Label>,
}

impl SymbolTable {
	pub fn new() -> Self {
		let mut table = Self { symbols: Vec::new(), ids: HashMap::new() };
		table.add_symbol(EPSILON_SYMBOL);
		table
	}

	/// Returns the label of `symbol`, registering it if needed.
	pub fn add_symbol(&mut self, symbol: &str) -> Label {
		if let Some(&id) = self.ids.get(symbol) {
			return id;
		}
		let id = self.symbols.len() as Label;
		self.symbols.push(symbol.to_owned());
		self.ids.insert(symbol.to_owned(), id);
		id
	}

	pub fn find(&self, symbol: &str) -> Option<Label> {
		self.ids.get(symbol).copied()
	}

	pub fn symbol(&self, label: Label) -> Option<&str> {
		self.symbols.get(label as usize).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	pub fn is_empty(&self) -> bool {
		self.symbols.len() <= 1
	}
}

impl Default for SymbolTable {
	fn default() -> Self {
		Self::new()
	}
}

/// Transition between two states.
#[derive(Clone, Debug, PartialEq)]
pub struct Arc {
	pub ilabel: Label,
	pub olabel: Label,
	pub weight: Weight,
	pub nextstate: StateId,
}

impl Arc {
	pub fn new(ilabel: Label, olabel: Label, weight: Weight, nextstate: StateId) -> Self {
		Self { ilabel, olabel, weight, nextstate }
	}

	fn is_epsilon(&self) -> bool {
		self.ilabel == EPSILON && self.olabel == EPSILON
	}
}

/// One successful path, as symbols.
#[derive(Clone, Debug, PartialEq)]
pub struct FstPath {
	pub input: Vec<String>,
	pub output: Vec<String>,
	pub weight: Weight,
}

/// Mutable weighted transducer.
///
/// # Invariants
/// - `finals` and `arcs` have one slot per state
/// - every `nextstate` is a valid state id
#[derive(Clone, Debug, Default)]
pub struct Fst {
	start: Option<StateId>,
	finals: Vec<Option<Weight>>,
	arcs: Vec<Vec<Arc>>,
	symbols: SymbolTable,
}

/// Min-heap entry for `shortest_path`.
struct Candidate {
	cost: Weight,
	state: StateId,
}

impl PartialEq for Candidate {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Candidate {
	fn cmp(&self, other: &Self) -> Ordering {
		other.cost.total_cmp(&self.cost).then_with(|| other.state.cmp(&self.state))
	}
}

impl Fst {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_symbols(symbols: SymbolTable) -> Self {
		Self { symbols, ..Self::default() }
	}

	/// Linear acceptor reading `symbols` in order.
	pub fn linear_acceptor(symbols: &[&str]) -> Self {
		let mut fst = Self::new();
		let mut state = fst.add_state();
		fst.set_start(state);
		for symbol in symbols {
			let label = fst.symbols.add_symbol(symbol);
			let next = fst.add_state();
			fst.add_arc(state, Arc::new(label, label, 0.0, next));
			state = next;
		}
		fst.set_final(state, 0.0);
		fst
	}

	/// Compiles the AT&T text format.
	///
	/// - `src dst ilabel olabel [weight]` adds an arc
	/// - `state [weight]` marks a final state
	/// - the first state mentioned is the start state
	/// - labels are symbols, `<eps>` being epsilon
	pub fn compile_text(text: &str) -> Result<Self> {
		let mut fst = Self::new();

		for (n, line) in text.lines().enumerate() {
			let fields: Vec<&str> = line.split_whitespace().collect();
			if fields.is_empty() {
				continue;
			}
			let state = |s: &str| {
				s.parse::<StateId>()
					.map_err(|_| AccordError::Automaton(format!("line {}: invalid state {s}", n + 1)))
			};
			let weight = |w: Option<&&str>| match w {
				None => Ok(0.0),
				Some(w) => w
					.parse::<Weight>()
					.map_err(|_| AccordError::Automaton(format!("line {}: invalid weight {w}", n + 1))),
			};

			match fields.len() {
				1 | 2 => {
					let s = state(fields[0])?;
					fst.ensure_state(s);
					fst.start.get_or_insert(s);
					fst.set_final(s, weight(fields.get(1))?);
				}
				4 | 5 => {
					let (src, dst) = (state(fields[0])?, state(fields[1])?);
					fst.ensure_state(src.max(dst));
					fst.start.get_or_insert(src);
					let ilabel = fst.symbols.add_symbol(fields[2]);
					let olabel = fst.symbols.add_symbol(fields[3]);
					fst.add_arc(src, Arc::new(ilabel, olabel, weight(fields.get(4))?, dst));
				}
				count => {
					return Err(AccordError::Automaton(format!("line {}: unexpected {count} fields", n + 1)));
				}
			}
		}

		Ok(fst)
	}

	pub fn add_state(&mut self) -> StateId {
		self.finals.push(None);
		self.arcs.push(Vec::new());
		self.finals.len() - 1
	}

	fn ensure_state(&mut self, state: StateId) {
		while self.finals.len() <= state {
			self.add_state();
		}
	}

	pub fn set_start(&mut self, state: StateId) {
		self.start = Some(state);
	}

	pub fn set_final(&mut self, state: StateId, weight: Weight) {
		self.finals[state] = Some(weight);
	}

	pub fn add_arc(&mut self, state: StateId, arc: Arc) {
		self.arcs[state].push(arc);
	}

	pub fn start(&self) -> Option<StateId> {
		self.start
	}

	pub fn final_weight(&self, state: StateId) -> Option<Weight> {
		self.finals.get(state).copied().flatten()
	}

	pub fn arcs(&self, state: StateId) -> &[Arc] {
		self.arcs.get(state).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn num_states(&self) -> usize {
		self.finals.len()
	}

	pub fn num_arcs(&self) -> usize {
		self.arcs.iter().map(Vec::len).sum()
	}

	pub fn symbols(&self) -> &SymbolTable {
		&self.symbols
	}

	/// True when no path leads from the start state to a final state.
	pub fn is_empty(&self) -> bool {
		self.connect().num_states() == 0
	}

	/// No epsilon transition and no two arcs of a state share a label pair.
	pub fn is_deterministic(&self) -> bool {
		self.arcs.iter().all(|arcs| {
			let mut seen = HashSet::new();
			arcs.iter().all(|a| !a.is_epsilon() && seen.insert((a.ilabel, a.olabel)))
		})
	}

	/// Keeps only states that are both reachable and co-reachable.
	pub fn connect(&self) -> Fst {
		let mut result = Fst::with_symbols(self.symbols.clone());
		let Some(start) = self.start else { return result };
		let n = self.num_states();

		let mut accessible = vec![false; n];
		let mut queue = VecDeque::from([start]);
		accessible[start] = true;
		while let Some(q) = queue.pop_front() {
			for arc in &self.arcs[q] {
				if !accessible[arc.nextstate] {
					accessible[arc.nextstate] = true;
					queue.push_back(arc.nextstate);
				}
			}
		}

		let coaccessible = self.coaccessible();
		if !(accessible[start] && coaccessible[start]) {
			return result;
		}

		let mut mapping: Vec<Option<StateId>> = vec![None; n];
		for q in 0..n {
			if accessible[q] && coaccessible[q] {
				mapping[q] = Some(result.add_state());
			}
		}
		for q in 0..n {
			let Some(nq) = mapping[q] else { continue };
			result.finals[nq] = self.finals[q];
			for arc in &self.arcs[q] {
				if let Some(next) = mapping[arc.nextstate] {
					result.add_arc(nq, Arc { nextstate: next, ..arc.clone() });
				}
			}
		}
		result.start = mapping[start];
		result
	}

	/// States from which some final state can be reached.
	fn coaccessible(&self) -> Vec<bool> {
		let n = self.num_states();
		let mut reverse: Vec<Vec<StateId>> = vec![Vec::new(); n];
		for (q, arcs) in self.arcs.iter().enumerate() {
			for arc in arcs {
				reverse[arc.nextstate].push(q);
			}
		}
		let mut coaccessible = vec![false; n];
		let mut queue: VecDeque<StateId> = (0..n).filter(|&q| self.finals[q].is_some()).collect();
		for &q in &queue {
			coaccessible[q] = true;
		}
		while let Some(q) = queue.pop_front() {
			for &p in &reverse[q] {
				if !coaccessible[p] {
					coaccessible[p] = true;
					queue.push_back(p);
				}
			}
		}
		coaccessible
	}

	/// Composition `self ∘ other`: the output side of `self` feeds the input side of `other`.
	pub fn compose(&self, other: &Fst) -> Fst {
		let mut result = Fst::with_symbols(self.symbols.clone());
		let (Some(a0), Some(b0)) = (self.start, other.start) else { return result };

		// Labels of `other` expressed in the result table
		let translate: Vec<Label> = (0..other.symbols.len())
			.map(|l| {
				other
					.symbols
					.symbol(l as Label)
					.map(|s| result.symbols.add_symbol(s))
					.unwrap_or(EPSILON)
			})
			.collect();

		let mut index: HashMap<(StateId, StateId), StateId> = HashMap::new();
		let mut queue = VecDeque::new();
		let start = result.add_state();
		result.set_start(start);
		index.insert((a0, b0), start);
		queue.push_back((a0, b0));

		while let Some((qa, qb)) = queue.pop_front() {
			let q = index[&(qa, qb)];
			if let (Some(fa), Some(fb)) = (self.final_weight(qa), other.final_weight(qb)) {
				result.set_final(q, fa + fb);
			}

			let mut pending: Vec<(Label, Label, Weight, StateId, StateId)> = Vec::new();
			for ea in self.arcs(qa) {
				if ea.olabel == EPSILON {
					pending.push((ea.ilabel, EPSILON, ea.weight, ea.nextstate, qb));
					continue;
				}
				for eb in other.arcs(qb) {
					if translate[eb.ilabel as usize] == ea.olabel {
						pending.push((
							ea.ilabel,
							translate[eb.olabel as usize],
							ea.weight + eb.weight,
							ea.nextstate,
							eb.nextstate,
						));
					}
				}
			}
			for eb in other.arcs(qb) {
				if eb.ilabel == EPSILON {
					pending.push((EPSILON, translate[eb.olabel as usize], eb.weight, qa, eb.nextstate));
				}
			}

			for (ilabel, olabel, weight, na, nb) in pending {
				let next = match index.get(&(na, nb)) {
					Some(&s) => s,
					None => {
						let s = result.add_state();
						index.insert((na, nb), s);
						queue.push_back((na, nb));
						s
					}
				};
				result.add_arc(q, Arc::new(ilabel, olabel, weight, next));
			}
		}

		result.connect()
	}

	/// Cheapest epsilon distance from `state` to every state it reaches by epsilons.
	///
	/// Assumes no negative epsilon cycle.
	fn epsilon_closure(&self, state: StateId) -> BTreeMap<StateId, Weight> {
		let mut distance = BTreeMap::from([(state, 0.0)]);
		let mut queue = VecDeque::from([state]);
		while let Some(p) = queue.pop_front() {
			let d = distance[&p];
			for arc in self.arcs(p).iter().filter(|a| a.is_epsilon()) {
				let nd = d + arc.weight;
				if distance.get(&arc.nextstate).is_none_or(|&old| nd < old) {
					distance.insert(arc.nextstate, nd);
					queue.push_back(arc.nextstate);
				}
			}
		}
		distance
	}

	/// Removes `<eps>:<eps>` transitions.
	pub fn rm_epsilon(&self) -> Fst {
		let mut result = Fst::with_symbols(self.symbols.clone());
		for _ in 0..self.num_states() {
			result.add_state();
		}
		result.start = self.start;

		for q in 0..self.num_states() {
			for (p, d) in self.epsilon_closure(q) {
				if let Some(f) = self.finals[p] {
					let w = d + f;
					if result.finals[q].is_none_or(|old| w < old) {
						result.finals[q] = Some(w);
					}
				}
				for arc in self.arcs[p].iter().filter(|a| !a.is_epsilon()) {
					result.add_arc(q, Arc { weight: d + arc.weight, ..arc.clone() });
				}
			}
		}

		result.connect()
	}

	/// Weighted subset construction on label pairs.
	///
	/// Input and output labels are handled as one encoded label, so the result is
	/// deterministic on pairs. Epsilons are removed first.
	pub fn determinize(&self) -> Result<Fst> {
		let source = self.rm_epsilon();
		let mut result = Fst::with_symbols(source.symbols.clone());
		let Some(s0) = source.start else { return Ok(result) };

		type Subset = Vec<(StateId, Weight)>;
		let key = |subset: &Subset| -> Vec<(StateId, i64)> {
			subset.iter().map(|&(q, r)| (q, quantize(r))).collect()
		};

		let mut index: HashMap<Vec<(StateId, i64)>, StateId> = HashMap::new();
		let mut subsets: Vec<Subset> = Vec::new();

		let start_subset: Subset = vec![(s0, 0.0)];
		let start = result.add_state();
		result.set_start(start);
		index.insert(key(&start_subset), start);
		subsets.push(start_subset);

		let mut q = 0;
		while q < subsets.len() {
			let subset = subsets[q].clone();

			let final_weight = subset
				.iter()
				.filter_map(|&(p, r)| source.final_weight(p).map(|f| r + f))
				.reduce(Weight::min);
			if let Some(w) = final_weight {
				result.set_final(q, w);
			}

			let mut by_label: BTreeMap<(Label, Label), Vec<(StateId, Weight)>> = BTreeMap::new();
			for &(p, r) in &subset {
				for arc in source.arcs(p) {
					by_label.entry((arc.ilabel, arc.olabel)).or_default().push((arc.nextstate, r + arc.weight));
				}
			}

			for ((ilabel, olabel), targets) in by_label {
				let weight = targets.iter().map(|&(_, w)| w).fold(Weight::INFINITY, Weight::min);
				let mut residuals: BTreeMap<StateId, Weight> = BTreeMap::new();
				for (target, w) in targets {
					let r = w - weight;
					residuals.entry(target).and_modify(|old| *old = old.min(r)).or_insert(r);
				}

				let next_subset: Subset = residuals.into_iter().collect();
				let k = key(&next_subset);
				let next = match index.get(&k) {
					Some(&s) => s,
					None => {
						if subsets.len() >= MAX_DETERMINIZED_STATES {
							return Err(AccordError::Automaton(format!(
								"determinization exceeded {MAX_DETERMINIZED_STATES} states"
							)));
						}
						let s = result.add_state();
						index.insert(k, s);
						subsets.push(next_subset);
						s
					}
				};
				result.add_arc(q, Arc::new(ilabel, olabel, weight, next));
			}
			q += 1;
		}

		Ok(result)
	}

	/// Merges equivalent states of a deterministic machine (partition refinement).
	///
	/// Two states are merged when they have the same final weight and the same
	/// labelled, weighted transitions into the same classes. Weights are not pushed.
	pub fn minimize(&self) -> Result<Fst> {
		if !self.is_deterministic() {
			return Err(AccordError::Automaton("minimize requires a deterministic machine".to_owned()));
		}
		let Some(start) = self.start else { return Ok(self.clone()) };
		let n = self.num_states();

		let mut class = vec![0usize; n];
		let mut classes = 1;
		loop {
			type Signature = (usize, Option<i64>, Vec<(Label, Label, i64, usize)>);
			let mut signatures: HashMap<Signature, usize> = HashMap::new();
			let mut next_class = vec![0usize; n];
			for q in 0..n {
				let mut arcs: Vec<(Label, Label, i64, usize)> = self.arcs[q]
					.iter()
					.map(|a| (a.ilabel, a.olabel, quantize(a.weight), class[a.nextstate]))
					.collect();
				arcs.sort_unstable();
				let signature = (class[q], self.finals[q].map(quantize), arcs);
				let fresh = signatures.len();
				next_class[q] = *signatures.entry(signature).or_insert(fresh);
			}
			class = next_class;
			if signatures.len() == classes {
				break;
			}
			classes = signatures.len();
		}

		let mut result = Fst::with_symbols(self.symbols.clone());
		for _ in 0..classes {
			result.add_state();
		}
		let mut done = vec![false; classes];
		for q in 0..n {
			let c = class[q];
			if done[c] {
				continue;
			}
			done[c] = true;
			result.finals[c] = self.finals[q];
			for arc in &self.arcs[q] {
				result.add_arc(c, Arc { nextstate: class[arc.nextstate], ..arc.clone() });
			}
		}
		result.start = Some(class[start]);
		Ok(result.connect())
	}

	/// Cheapest successful path as a linear machine; empty when none exists.
	///
	/// Uses Dijkstra, so arc weights must be non-negative.
	pub fn shortest_path(&self) -> Fst {
		let mut result = Fst::with_symbols(self.symbols.clone());
		let Some(start) = self.start else { return result };
		let n = self.num_states();

		let mut distance = vec![Weight::INFINITY; n];
		let mut previous: Vec<Option<(StateId, usize)>> = vec![None; n];
		let mut heap = BinaryHeap::new();
		distance[start] = 0.0;
		heap.push(Candidate { cost: 0.0, state: start });

		while let Some(Candidate { cost, state }) = heap.pop() {
			if cost > distance[state] {
				continue;
			}
			for (i, arc) in self.arcs[state].iter().enumerate() {
				let next_cost = cost + arc.weight;
				if next_cost < distance[arc.nextstate] {
					distance[arc.nextstate] = next_cost;
					previous[arc.nextstate] = Some((state, i));
					heap.push(Candidate { cost: next_cost, state: arc.nextstate });
				}
			}
		}

		let best = (0..n)
			.filter_map(|q| self.finals[q].map(|f| (q, distance[q] + f)))
			.filter(|(_, total)| total.is_finite())
			.min_by(|a, b| a.1.total_cmp(&b.1));
		let Some((last, _)) = best else { return result };

		let mut path: Vec<&Arc> = Vec::new();
		let mut state = last;
		while let Some((p, i)) = previous[state] {
			path.push(&self.arcs[p][i]);
			state = p;
		}
		path.reverse();

		let mut current = result.add_state();
		result.set_start(current);
		for arc in path {
			let next = result.add_state();
			result.add_arc(current, Arc { nextstate: next, ..arc.clone() });
			current = next;
		}
		result.set_final(current, self.finals[last].unwrap_or(0.0));
		result
	}

	/// Enumerates up to `limit` successful paths, at most `num_states` arcs long.
	///
	/// Branches that cannot reach a final state are never explored, and the
	/// walk gives up after `MAX_PATH_VISITS` steps on heavily cyclic machines.
	pub fn paths(&self, limit: usize) -> Vec<FstPath> {
		let mut found = Vec::new();
		let Some(start) = self.start else { return found };
		let coaccessible = self.coaccessible();
		if !coaccessible[start] {
			return found;
		}
		let max_depth = self.num_states();

		let mut visits = 0;
		let mut stack: Vec<(StateId, Vec<&Arc>)> = vec![(start, Vec::new())];
		while let Some((state, arcs)) = stack.pop() {
			visits += 1;
			if found.len() >= limit || visits > MAX_PATH_VISITS {
				break;
			}
			if let Some(f) = self.finals[state] {
				let symbols = |pick: fn(&Arc) -> Label| -> Vec<String> {
					arcs.iter()
						.map(|a| pick(a))
						.filter(|&l| l != EPSILON)
						.filter_map(|l| self.symbols.symbol(l).map(str::to_owned))
						.collect()
				};
				found.push(FstPath {
					input: symbols(|a| a.ilabel),
					output: symbols(|a| a.olabel),
					weight: arcs.iter().map(|a| a.weight).sum::<Weight>() + f,
				});
			}
			if arcs.len() >= max_depth {
				continue;
			}
			for arc in self.arcs[state].iter().rev().filter(|a| coaccessible[a.nextstate]) {
				let mut next = arcs.clone();
				next.push(arc);
				stack.push((arc.nextstate, next));
			}
		}
		found
	}
}
