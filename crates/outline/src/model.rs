//! Hierarchical outline model built from document symbol providers.
//!
//! An [`OutlineModel`] is the per-document symbol tree: one
//! [`OutlineGroup`] per contributing provider, each holding a tree of
//! [`OutlineElement`]s converted from the provider's raw
//! [`DocumentSymbol`]s. Models are built by [`OutlineModel::create`], which
//! races the concurrent provider calls against registry changes and the
//! caller's cancellation token, then compacts the result.

use std::cmp::Ordering;
use std::sync::Arc;

use lsp_types::{Diagnostic, DiagnosticSeverity, DocumentSymbol, Position, Range, Uri};
use outline_collections::{LinkedMap, Touch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::document::SymbolDocument;
use crate::error::OutlineError;
use crate::registry::SymbolProviderRegistry;

/// A diagnostic annotation correlated onto the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineMarker {
	pub range: Range,
	pub severity: DiagnosticSeverity,
}

impl From<&Diagnostic> for OutlineMarker {
	fn from(diagnostic: &Diagnostic) -> Self {
		Self {
			range: diagnostic.range,
			severity: diagnostic
				.severity
				.unwrap_or(DiagnosticSeverity::INFORMATION),
		}
	}
}

/// Aggregate of the markers attributed to one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSummary {
	/// Markers owned by this element itself, descendants excluded. Zero
	/// means every intersecting marker was claimed by a descendant; the
	/// summary is still present so the subtree reads as marked.
	pub count: usize,
	/// Most severe marker seen in this element's range, descendants
	/// included.
	pub top_severity: DiagnosticSeverity,
}

fn cmp_positions(a: Position, b: Position) -> Ordering {
	a.line.cmp(&b.line).then(a.character.cmp(&b.character))
}

/// Orders ranges by start position, then end position.
fn cmp_range_starts(a: Range, b: Range) -> Ordering {
	cmp_positions(a.start, b.start).then(cmp_positions(a.end, b.end))
}

/// Strict intersection; merely touching ranges do not intersect.
fn ranges_intersect(a: Range, b: Range) -> bool {
	cmp_positions(a.start, b.end) == Ordering::Less
		&& cmp_positions(b.start, a.end) == Ordering::Less
}

/// Inclusive containment on both ends.
fn range_contains(range: Range, position: Position) -> bool {
	cmp_positions(range.start, position) != Ordering::Greater
		&& cmp_positions(position, range.end) != Ordering::Greater
}

/// Rank for "most severe wins" comparisons. LSP numbers ERROR lowest, so
/// map to an explicit rank first.
fn severity_rank(severity: DiagnosticSeverity) -> u8 {
	match severity {
		DiagnosticSeverity::ERROR => 4,
		DiagnosticSeverity::WARNING => 3,
		DiagnosticSeverity::INFORMATION => 2,
		DiagnosticSeverity::HINT => 1,
		_ => 0,
	}
}

/// Sibling-unique id for `symbol` under `parent_id`.
///
/// The candidate is `{parent_id}/{name}`. A collision appends the symbol's
/// start position, a further collision (the same symbol repeated at the
/// same position) appends an incrementing counter. Deterministic for a
/// given sibling order.
fn find_id(
	symbol: &DocumentSymbol,
	parent_id: &str,
	siblings: &LinkedMap<String, OutlineElement>,
) -> String {
	let mut candidate = format!("{parent_id}/{}", symbol.name);
	if siblings.contains_key(candidate.as_str()) {
		candidate = format!(
			"{parent_id}/{}_{}_{}",
			symbol.name, symbol.range.start.line, symbol.range.start.character
		);
	}
	let mut id = candidate.clone();
	let mut counter = 0;
	while siblings.contains_key(id.as_str()) {
		id = format!("{candidate}_{counter}");
		counter += 1;
	}
	id
}

/// One symbol in the outline tree.
///
/// Ids are path-shaped (`{parent_id}/{name}…`), so an element's ancestry is
/// derivable from its id alone; no back-reference to the parent is stored.
#[derive(Debug)]
pub struct OutlineElement {
	id: String,
	symbol: DocumentSymbol,
	children: LinkedMap<String, OutlineElement>,
	marker: Option<MarkerSummary>,
}

impl OutlineElement {
	/// Converts `symbol` and, recursively, its children into elements
	/// attached to `siblings` under collision-free ids.
	fn attach(
		mut symbol: DocumentSymbol,
		parent_id: &str,
		siblings: &mut LinkedMap<String, OutlineElement>,
	) {
		let nested = symbol.children.take().unwrap_or_default();
		let id = find_id(&symbol, parent_id, siblings);
		let mut element = OutlineElement {
			id,
			symbol,
			children: LinkedMap::new(),
			marker: None,
		};
		for child in nested {
			Self::attach(child, &element.id, &mut element.children);
		}
		siblings.set(element.id.clone(), element, Touch::None);
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// The provider's raw symbol. Its `children` field is always `None`;
	/// nesting lives in [`children`](Self::children).
	pub fn symbol(&self) -> &DocumentSymbol {
		&self.symbol
	}

	pub fn children(&self) -> &LinkedMap<String, OutlineElement> {
		&self.children
	}

	pub fn marker(&self) -> Option<MarkerSummary> {
		self.marker
	}

	/// Claims the markers intersecting this element out of `markers`
	/// (sorted by range start), lets descendants claim out of the local
	/// bucket, and records the summary.
	fn update_marker(&mut self, markers: &mut Vec<OutlineMarker>) {
		self.marker = None;
		let range = self.symbol.range;
		let mut start =
			markers.partition_point(|m| cmp_range_starts(m.range, range) == Ordering::Less);
		// A marker that starts earlier can still reach into this range.
		if start > 0 && ranges_intersect(markers[start - 1].range, range) {
			start -= 1;
		}
		let mut end = start;
		while end < markers.len() && ranges_intersect(markers[end].range, range) {
			end += 1;
		}
		let mut claimed: Vec<OutlineMarker> = markers.drain(start..end).collect();
		let top_severity = claimed
			.iter()
			.map(|m| m.severity)
			.max_by_key(|severity| severity_rank(*severity));
		self.children
			.for_each_mut(|_, child| child.update_marker(&mut claimed));
		if let Some(top_severity) = top_severity {
			self.marker = Some(MarkerSummary {
				count: claimed.len(),
				top_severity,
			});
		}
	}
}

/// First element with the given id, in tree order. Exhaustive walk: symbol
/// names may themselves contain `/`, so the path shape of ids cannot be
/// used to prune.
fn find_in<'a>(
	children: &'a LinkedMap<String, OutlineElement>,
	id: &str,
) -> Option<&'a OutlineElement> {
	for (_, child) in children.iter() {
		if child.id == id {
			return Some(child);
		}
		if let Some(found) = find_in(&child.children, id) {
			return Some(found);
		}
	}
	None
}

/// The deepest element among `children` whose range contains `position`.
fn element_containing(
	children: &LinkedMap<String, OutlineElement>,
	position: Position,
) -> Option<&OutlineElement> {
	for (_, child) in children.iter() {
		if range_contains(child.symbol.range, position) {
			return Some(element_containing(&child.children, position).unwrap_or(child));
		}
	}
	None
}

fn collect_symbols<'a>(
	children: &'a LinkedMap<String, OutlineElement>,
	out: &mut Vec<&'a DocumentSymbol>,
) {
	for (_, child) in children.iter() {
		out.push(&child.symbol);
		collect_symbols(&child.children, out);
	}
}

/// One provider's contribution to the outline.
#[derive(Debug)]
pub struct OutlineGroup {
	id: String,
	label: String,
	order: usize,
	children: LinkedMap<String, OutlineElement>,
}

impl OutlineGroup {
	fn new(id: String, label: String, order: usize) -> Self {
		Self {
			id,
			label,
			order,
			children: LinkedMap::new(),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// The provider's label.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Position of the provider in the build's priority order.
	pub fn order(&self) -> usize {
		self.order
	}

	pub fn children(&self) -> &LinkedMap<String, OutlineElement> {
		&self.children
	}

	fn add_symbol(&mut self, symbol: DocumentSymbol) {
		OutlineElement::attach(symbol, &self.id, &mut self.children);
	}

	fn update_marker(&mut self, markers: &mut Vec<OutlineMarker>) {
		self.children
			.for_each_mut(|_, child| child.update_marker(markers));
	}
}

/// Root-level children of an [`OutlineModel`].
#[derive(Debug)]
pub enum ModelChildren {
	/// Several providers contributed: one named section per provider. Also
	/// the shape of the empty outline.
	Groups(LinkedMap<String, OutlineGroup>),
	/// Exactly one provider contributed; its symbols are adopted directly
	/// so a single-provider document shows no artificial section level.
	Elements(LinkedMap<String, OutlineElement>),
}

/// The outline for one document.
#[derive(Debug)]
pub struct OutlineModel {
	uri: Uri,
	children: ModelChildren,
}

impl OutlineModel {
	/// Builds the outline for `document` from the registry's current
	/// provider set.
	///
	/// All providers run concurrently; a provider failure is logged and
	/// leaves its group empty. If the ordered provider set changes while
	/// the build is in flight, the attempt is cancelled, allowed to settle,
	/// and retried against the new set. Returns
	/// [`OutlineError::Cancelled`] once `token` fires; a cancelled build
	/// never yields a partial tree.
	pub async fn create(
		registry: Arc<SymbolProviderRegistry>,
		document: Arc<dyn SymbolDocument>,
		token: CancellationToken,
	) -> Result<OutlineModel, OutlineError> {
		loop {
			// Subscribe before snapshotting so a registration landing
			// between the two cannot be missed.
			let mut changes = registry.subscribe();
			let providers = registry.ordered(document.as_ref());
			let signature: Vec<u64> = providers.iter().map(|entry| entry.id()).collect();
			let build = token.child_token();

			let collect =
				futures::future::join_all(providers.iter().enumerate().map(|(index, entry)| {
					let build = build.clone();
					let document = Arc::clone(&document);
					let provider = Arc::clone(entry.provider());
					async move {
						let id = format!("root/provider_{index}");
						let mut group =
							OutlineGroup::new(id, provider.label().to_owned(), index);
						match provider.provide_symbols(document.as_ref(), &build).await {
							Ok(symbols) => {
								for symbol in symbols {
									group.add_symbol(symbol);
								}
							}
							Err(error) => {
								warn!(
									provider = group.label.as_str(),
									error = %error,
									"document symbol provider failed"
								);
							}
						}
						group
					}
				}));
			tokio::pin!(collect);

			let changed = async {
				loop {
					if changes.changed().await.is_err() {
						// Registry gone; no further changes can arrive.
						std::future::pending::<()>().await;
					}
					if registry.signature(document.as_ref()) != signature {
						break;
					}
				}
			};

			let groups = tokio::select! {
				groups = &mut collect => groups,
				_ = changed => {
					// The provider set moved underneath this build. Cancel,
					// let the in-flight calls settle, then start over.
					build.cancel();
					let _ = collect.await;
					if token.is_cancelled() {
						return Err(OutlineError::Cancelled);
					}
					debug!(
						uri = document.uri().as_str(),
						"symbol providers changed during outline build, retrying"
					);
					continue;
				}
			};

			if token.is_cancelled() {
				return Err(OutlineError::Cancelled);
			}

			let mut kept = LinkedMap::new();
			for group in groups {
				if !group.children.is_empty() {
					kept.set(group.id.clone(), group, Touch::None);
				}
			}
			return Ok(OutlineModel::compact(document.uri().clone(), kept));
		}
	}

	/// Folds the non-empty groups into the final root shape: a single
	/// group's children are adopted directly, anything else stays grouped.
	fn compact(uri: Uri, mut groups: LinkedMap<String, OutlineGroup>) -> Self {
		let children = if groups.len() == 1 {
			match groups.shift() {
				Some((_, group)) => ModelChildren::Elements(group.children),
				None => ModelChildren::Groups(groups),
			}
		} else {
			ModelChildren::Groups(groups)
		};
		Self { uri, children }
	}

	pub fn uri(&self) -> &Uri {
		&self.uri
	}

	pub fn children(&self) -> &ModelChildren {
		&self.children
	}

	/// True when no provider contributed any symbol. A valid state for an
	/// empty document, distinct from a failed build.
	pub fn is_empty(&self) -> bool {
		match &self.children {
			ModelChildren::Groups(groups) => groups.is_empty(),
			ModelChildren::Elements(children) => children.is_empty(),
		}
	}

	/// Correlates diagnostic markers onto the tree.
	///
	/// Markers are sorted by range start and handed to each provider group
	/// independently; within a group, every marker ends up on the deepest
	/// element whose range it intersects, and ancestors record only the
	/// top severity of what their subtree claimed.
	pub fn update_marker(&mut self, mut markers: Vec<OutlineMarker>) {
		markers.sort_by(|a, b| cmp_range_starts(a.range, b.range));
		match &mut self.children {
			ModelChildren::Groups(groups) => {
				groups.for_each_mut(|_, group| {
					let mut own = markers.clone();
					group.update_marker(&mut own);
				});
			}
			ModelChildren::Elements(children) => {
				children.for_each_mut(|_, child| child.update_marker(&mut markers));
			}
		}
	}

	/// Locates an element by its id anywhere in the tree.
	pub fn item_by_id(&self, id: &str) -> Option<&OutlineElement> {
		match &self.children {
			ModelChildren::Groups(groups) => groups
				.iter()
				.find_map(|(_, group)| find_in(&group.children, id)),
			ModelChildren::Elements(children) => find_in(children, id),
		}
	}

	/// The deepest element whose range contains `position`.
	pub fn item_enclosing_position(&self, position: Position) -> Option<&OutlineElement> {
		match &self.children {
			ModelChildren::Groups(groups) => groups
				.iter()
				.find_map(|(_, group)| element_containing(&group.children, position)),
			ModelChildren::Elements(children) => element_containing(children, position),
		}
	}

	/// The root-level symbols across all groups, ordered by range start.
	pub fn top_level_symbols(&self) -> Vec<&DocumentSymbol> {
		let mut out = Vec::new();
		match &self.children {
			ModelChildren::Groups(groups) => {
				for (_, group) in groups.iter() {
					out.extend(group.children.values().map(OutlineElement::symbol));
				}
			}
			ModelChildren::Elements(children) => {
				out.extend(children.values().map(OutlineElement::symbol));
			}
		}
		out.sort_by(|a, b| cmp_range_starts(a.range, b.range));
		out
	}

	/// Every symbol in the tree, flattened and ordered by range start.
	pub fn flat_symbols(&self) -> Vec<&DocumentSymbol> {
		let mut out = Vec::new();
		match &self.children {
			ModelChildren::Groups(groups) => {
				for (_, group) in groups.iter() {
					collect_symbols(&group.children, &mut out);
				}
			}
			ModelChildren::Elements(children) => collect_symbols(children, &mut out),
		}
		out.sort_by(|a, b| cmp_range_starts(a.range, b.range));
		out
	}
}
