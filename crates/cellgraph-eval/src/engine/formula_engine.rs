use cellgraph_common::{LiteralValue, SheetId};
use rustc_hash::{FxHashMap, FxHashSet};

use super::EngineConfig;
use crate::EngineError;
use crate::dependency::DependencyManager;
use crate::formula::{EvalContext, Formula};
use crate::pool::{RefId, ReferencePool};
use crate::reference::{Reference, ReferenceFactory, ReferenceKind};
use crate::sheet::Workbook;

/// Notifications surfaced to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// Formulas that just became part of a cycle. They are skipped by
    /// automatic recalculation until the cycle is broken.
    CircularReferenceDetected { references: Vec<Reference> },
    /// Formulas removed by a structural edit, because either their own cell or
    /// something they read was destroyed.
    FormulasInvalidated { references: Vec<Reference> },
}

/// A formula together with the pooled ids it is bound to.
pub(crate) struct BoundFormula {
    pub(crate) formula: Formula,
    /// Parallel to `formula.dependency_references()`. Entries may repeat after
    /// two dependencies were merged by an edit.
    pub(crate) deps: Vec<RefId>,
}

impl BoundFormula {
    pub(crate) fn unique_deps(&self) -> Vec<RefId> {
        unique(&self.deps)
    }
}

pub(crate) fn unique(ids: &[RefId]) -> Vec<RefId> {
    let mut seen = FxHashSet::default();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub struct FormulaEngine<W: Workbook> {
    pub(crate) config: EngineConfig,
    pub(crate) factory: ReferenceFactory,
    pub(crate) workbook: W,
    pub(crate) pool: ReferencePool,
    pub(crate) dependencies: DependencyManager,
    pub(crate) formulas: FxHashMap<RefId, BoundFormula>,
    pub(crate) bound_values: FxHashMap<ReferenceKind, LiteralValue>,
    pub(crate) circular: FxHashSet<RefId>,
    event_handler: Option<Box<dyn FnMut(&EngineEvent)>>,
}

impl<W: Workbook> FormulaEngine<W> {
    pub fn new(workbook: W, config: EngineConfig) -> Self {
        Self {
            config,
            factory: ReferenceFactory::new(config.bounds),
            workbook,
            pool: ReferencePool::new(),
            dependencies: DependencyManager::new(),
            formulas: FxHashMap::default(),
            bound_values: FxHashMap::default(),
            circular: FxHashSet::default(),
            event_handler: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Factory using this engine's grid bounds.
    pub fn factory(&self) -> &ReferenceFactory {
        &self.factory
    }

    pub fn workbook(&self) -> &W {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut W {
        &mut self.workbook
    }

    pub fn into_workbook(self) -> W {
        self.workbook
    }

    pub fn pool(&self) -> &ReferencePool {
        &self.pool
    }

    pub fn dependency_manager(&self) -> &DependencyManager {
        &self.dependencies
    }

    pub fn set_event_handler(&mut self, handler: impl FnMut(&EngineEvent) + 'static) {
        self.event_handler = Some(Box::new(handler));
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        if let Some(handler) = self.event_handler.as_mut() {
            handler(&event);
        }
    }

    /* ─────────────── formulas ─────────────── */

    /// Binds `formula` to `self_ref` and registers its dependencies.
    ///
    /// Circularity is reported through [`EngineEvent::CircularReferenceDetected`],
    /// never rejected.
    pub fn add_formula(&mut self, formula: Formula, self_ref: Reference) -> Result<RefId, EngineError> {
        if !matches!(
            self_ref.kind(),
            ReferenceKind::Cell(_) | ReferenceKind::Named(_) | ReferenceKind::External(_)
        ) {
            return Err(EngineError::UnsupportedSelfReference(self.a1(&self_ref)));
        }
        if !self_ref.is_valid() {
            return Err(EngineError::InvalidReference);
        }
        if let Some(id) = self.pool.lookup(&self_ref) {
            if self.formulas.contains_key(&id) {
                return Err(EngineError::SelfReferenceOccupied(self.a1(&self_ref)));
            }
        }

        let self_id = self.pool.get_or_insert(self_ref)?;
        let mut deps = Vec::with_capacity(formula.dependency_references().len());
        for r in formula.dependency_references() {
            match self.pool.get_or_insert(r.clone()) {
                Ok(id) => deps.push(id),
                Err(e) => {
                    self.release_all(&deps);
                    self.release_all(&[self_id]);
                    return Err(e);
                }
            }
        }
        if let Err(e) = self
            .dependencies
            .add_formula(self_id, &unique(&deps), &self.pool)
        {
            self.release_all(&deps);
            self.release_all(&[self_id]);
            return Err(e);
        }
        self.formulas.insert(self_id, BoundFormula { formula, deps });

        let mut candidates = vec![self_id];
        candidates.extend(self.reachable_formulas(self_id));
        self.detect_circular(candidates);
        Ok(self_id)
    }

    /// Unbinds the formula at `self_ref`, returning it with its dependency
    /// references at their current locations.
    pub fn remove_formula(&mut self, self_ref: &Reference) -> Result<Formula, EngineError> {
        let id = self
            .pool
            .lookup(self_ref)
            .filter(|id| self.formulas.contains_key(id))
            .ok_or_else(|| EngineError::FormulaNotFound(self.a1(self_ref)))?;
        let bound = self.unbind(id)?;
        self.circular = self
            .circular
            .iter()
            .copied()
            .filter(|&c| self.formulas.contains_key(&c) && self.dependencies.is_circular(c, &self.pool))
            .collect();
        Ok(bound.formula)
    }

    /// Removes the formula bound at `id` from the graph and releases every
    /// pooled reference it held.
    pub(crate) fn unbind(&mut self, id: RefId) -> Result<BoundFormula, EngineError> {
        let unique_deps = match self.formulas.get(&id) {
            Some(bound) => bound.unique_deps(),
            None => return Err(EngineError::FormulaNotFound(format!("{id:?}"))),
        };
        self.dependencies.remove_formula(id, &unique_deps, &self.pool)?;
        let Some(mut bound) = self.formulas.remove(&id) else {
            return Err(EngineError::FormulaNotFound(format!("{id:?}")));
        };
        let current: Vec<Reference> = bound
            .deps
            .iter()
            .filter_map(|d| self.pool.get(*d).cloned())
            .collect();
        bound.formula.set_dependency_references(current);
        if let Some(r) = self.pool.get(id) {
            if !matches!(r.kind(), ReferenceKind::Cell(_)) {
                self.bound_values.remove(r.kind());
            }
        }
        let deps = bound.deps.clone();
        self.release_all(&deps);
        self.release_all(&[id]);
        self.circular.remove(&id);
        Ok(bound)
    }

    fn release_all(&mut self, ids: &[RefId]) {
        for &id in ids {
            if self.pool.release(id).is_some() {
                self.dependencies.remove_reference(id);
            }
        }
    }

    pub fn formula(&self, self_ref: &Reference) -> Option<&Formula> {
        let id = self.pool.lookup(self_ref)?;
        self.formulas.get(&id).map(|b| &b.formula)
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    /* ─────────────── values ─────────────── */

    /// Writes a plain value into a cell, replacing any formula bound there, and
    /// recalculates everything that reads the cell.
    pub fn set_cell_value(
        &mut self,
        sheet: SheetId,
        row: u32,
        col: u32,
        value: LiteralValue,
    ) -> Result<Vec<Reference>, EngineError> {
        let cell = self.factory.cell(sheet, row, col)?;
        if self.workbook.sheet(sheet).is_none() {
            return Err(EngineError::UnknownSheet(sheet));
        }
        if self.formula(&cell).is_some() {
            self.remove_formula(&cell)?;
        }
        if let Some(s) = self.workbook.sheet_mut(sheet) {
            s.set(row, col, value);
        }
        self.recalculate(&cell)
    }

    /// Sets the value of a name or external binding that has no formula.
    pub fn set_bound_value(
        &mut self,
        reference: &Reference,
        value: LiteralValue,
    ) -> Result<Vec<Reference>, EngineError> {
        if !matches!(
            reference.kind(),
            ReferenceKind::Named(_) | ReferenceKind::External(_)
        ) {
            return Err(EngineError::InvalidArgument(format!(
                "{} is not a name or external binding",
                self.a1(reference)
            )));
        }
        if self.formula(reference).is_some() {
            self.remove_formula(reference)?;
        }
        self.bound_values.insert(reference.kind().clone(), value);
        self.recalculate(reference)
    }

    pub fn bound_value(&self, reference: &Reference) -> Option<&LiteralValue> {
        self.bound_values.get(reference.kind())
    }

    /* ─────────────── recalculation ─────────────── */

    /// Re-evaluates, in dependency order, every formula affected by a change
    /// at `root`. Circular formulas are skipped.
    pub fn recalculate(&mut self, root: &Reference) -> Result<Vec<Reference>, EngineError> {
        if !root.is_valid() {
            return Err(EngineError::InvalidReference);
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recalculate", root = %root).entered();
        let list = self
            .dependencies
            .reference_calculation_list(root, &self.pool);
        Ok(self.run_list(&list))
    }

    /// Evaluates every non-circular formula once, sources first.
    pub fn recalculate_all(&mut self) -> Vec<Reference> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recalculate_all", formulas = self.formulas.len()).entered();
        let mut sources: Vec<RefId> = self
            .formulas
            .iter()
            .filter(|(id, b)| b.deps.is_empty() && self.dependencies.precedents_of(**id).is_empty())
            .map(|(id, _)| *id)
            .filter(|id| !self.circular.contains(id))
            .collect();
        sources.sort_unstable();
        let list = self.dependencies.all_calculation_list(&self.pool);
        sources.extend(list);
        self.run_list(&sources)
    }

    pub(crate) fn recalculate_ids(&mut self, roots: &[RefId]) -> Vec<Reference> {
        let list = self.dependencies.calculation_list(roots, &self.pool);
        self.run_list(&list)
    }

    fn run_list(&mut self, list: &[RefId]) -> Vec<Reference> {
        let mut done = Vec::with_capacity(list.len());
        for &id in list {
            if self.evaluate_id(id).is_some() {
                if let Some(r) = self.pool.get(id) {
                    done.push(r.clone());
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(evaluated = done.len(), "calculation list finished");
        done
    }

    /// Evaluates one formula on demand, even if it is circular.
    pub fn evaluate_formula(&mut self, self_ref: &Reference) -> Result<LiteralValue, EngineError> {
        let id = self
            .pool
            .lookup(self_ref)
            .ok_or_else(|| EngineError::FormulaNotFound(self.a1(self_ref)))?;
        self.evaluate_id(id)
            .ok_or_else(|| EngineError::FormulaNotFound(self.a1(self_ref)))
    }

    fn evaluate_id(&mut self, id: RefId) -> Option<LiteralValue> {
        let bound = self.formulas.get(&id)?;
        let self_ref = self.pool.get(id)?;
        let deps: Vec<&Reference> = bound.deps.iter().filter_map(|d| self.pool.get(*d)).collect();
        let value = {
            let ctx = EvalContext::new(self_ref, deps, &self.workbook, &self.bound_values);
            bound.formula.evaluate(&ctx)
        };
        let target = self_ref.clone();
        self.write_value(&target, value.clone());
        Some(value)
    }

    pub(crate) fn write_value(&mut self, target: &Reference, value: LiteralValue) {
        match target.kind() {
            ReferenceKind::Cell(c) => {
                if let Some(sheet) = self.workbook.sheet_mut(c.sheet) {
                    sheet.set(c.row, c.col, value);
                }
            }
            ReferenceKind::Named(_) | ReferenceKind::External(_) => {
                self.bound_values.insert(target.kind().clone(), value);
            }
            _ => {}
        }
    }

    /* ─────────────── cycles ─────────────── */

    fn reachable_formulas(&self, from: RefId) -> Vec<RefId> {
        let mut seen = FxHashSet::default();
        let mut stack = self.dependencies.dependents_of(from).to_vec();
        let mut out = Vec::new();
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            if self.formulas.contains_key(&n) {
                out.push(n);
            }
            stack.extend_from_slice(self.dependencies.dependents_of(n));
        }
        out
    }

    /// Adds newly circular formulas among `candidates` to the circular set and
    /// notifies the handler.
    pub(crate) fn detect_circular(&mut self, candidates: Vec<RefId>) {
        let mut fresh: Vec<RefId> = unique(&candidates)
            .into_iter()
            .filter(|id| {
                !self.circular.contains(id)
                    && self.formulas.contains_key(id)
                    && self.dependencies.is_circular(*id, &self.pool)
            })
            .collect();
        if fresh.is_empty() {
            return;
        }
        fresh.sort_unstable();
        self.circular.extend(fresh.iter().copied());
        let references: Vec<Reference> = fresh
            .iter()
            .filter_map(|id| self.pool.get(*id).cloned())
            .collect();
        #[cfg(feature = "tracing")]
        tracing::debug!(count = references.len(), "circular references detected");
        self.emit(EngineEvent::CircularReferenceDetected { references });
    }

    /// Recomputes the circular set from scratch, reporting new members.
    pub(crate) fn refresh_circular(&mut self) {
        self.circular
            .retain(|id| self.formulas.contains_key(id) && self.dependencies.is_circular(*id, &self.pool));
        let all: Vec<RefId> = self.formulas.keys().copied().collect();
        self.detect_circular(all);
    }

    pub fn is_circular(&self, self_ref: &Reference) -> bool {
        self.pool
            .lookup(self_ref)
            .is_some_and(|id| self.circular.contains(&id))
    }

    pub fn circular_references(&self) -> Vec<Reference> {
        let mut ids: Vec<RefId> = self.circular.iter().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.pool.get(id).cloned())
            .collect()
    }

    /* ─────────────── queries ─────────────── */

    /// False for ids whose reference was invalidated and evicted.
    pub fn is_reference_valid(&self, id: RefId) -> bool {
        self.pool.get(id).is_some_and(Reference::is_valid)
    }

    pub fn reference(&self, id: RefId) -> Option<&Reference> {
        self.pool.get(id)
    }

    pub fn lookup(&self, reference: &Reference) -> Option<RefId> {
        self.pool.lookup(reference)
    }

    pub fn direct_precedents_count(&self, reference: &Reference) -> Result<usize, EngineError> {
        let id = self.pooled(reference)?;
        Ok(self.dependencies.direct_precedents_count(id))
    }

    pub fn direct_dependents_count(&self, reference: &Reference) -> Result<usize, EngineError> {
        let id = self.pooled(reference)?;
        Ok(self.dependencies.direct_dependents_count(id))
    }

    fn pooled(&self, reference: &Reference) -> Result<RefId, EngineError> {
        self.pool
            .lookup(reference)
            .ok_or_else(|| EngineError::NotPooled(self.a1(reference)))
    }

    /// `tail -> [heads]` per line, using sheet names.
    pub fn dump_dependency_graph(&self) -> String {
        self.dependencies.dump(|id| {
            self.pool
                .get(id)
                .map(|r| self.a1(r))
                .unwrap_or_else(|| format!("{id:?}"))
        })
    }

    /// A1 text for `reference` with this workbook's sheet names.
    pub fn a1(&self, reference: &Reference) -> String {
        reference.to_a1(|id| self.workbook.sheet(id).map(|s| s.name().to_string()))
    }

    /* ─────────────── bulk toggles ─────────────── */

    /// Stops range-link maintenance. Returns whether it was already stopped.
    pub fn suspend_range_links(&mut self) -> bool {
        self.dependencies.suspend_range_links()
    }

    pub fn resume_range_links(&mut self) {
        self.dependencies.resume_range_links(&self.pool);
        self.refresh_circular();
    }
}
