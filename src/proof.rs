use crate::definitions::*;
use crate::expr::*;
use crate::position::*;
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepKind {
	Assertion {
		statement: Expression,
	},
	/// Предполагаем `assumption` и выводим что-то подшагами.
	Deduction {
		assumption: Expression,
		substeps: Vec<ProofStep>,
	},
	/// Подшаги верны для произвольных `variables`.
	Generalization {
		variables: Vec<String>,
		substeps: Vec<ProofStep>,
	},
}

/// Шаг доказательства. `path` хранит полный путь от корня доказательства, после любой правки он равен настоящему положению шага.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProofStep {
	pub path: TreePathBuf,
	pub kind: StepKind,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StepError {
	#[error("path to a proof step can't be empty")]
	EmptyPath,
	#[error("there is no step {index} at depth {depth}")]
	PathOutOfRange {
		depth: usize,
		index: usize,
	},
	#[error("step at depth {depth} has no substeps")]
	NoSubsteps {
		depth: usize,
	},
	#[error("range {start}..{end} is not inside {len} steps")]
	InvalidRange {
		start: usize,
		end: usize,
		len: usize,
	},
}

impl ProofStep {
	/// Путь у нового шага пустой, его выставит операция, которая вставит шаг в дерево.
	pub fn new(kind: StepKind) -> Self {
		ProofStep {
			path: TreePathBuf::new(),
			kind,
		}
	}

	pub fn assertion(statement: Expression) -> Self {
		ProofStep::new(StepKind::Assertion { statement })
	}

	pub fn deduction(assumption: Expression, substeps: Vec<ProofStep>) -> Self {
		let mut step = ProofStep::new(StepKind::Deduction { assumption, substeps });
		step.set_path(TreePathBuf::new());
		step
	}

	pub fn generalization(variables: Vec<String>, substeps: Vec<ProofStep>) -> Self {
		let mut step = ProofStep::new(StepKind::Generalization { variables, substeps });
		step.set_path(TreePathBuf::new());
		step
	}

	pub fn substeps(&self) -> Option<&[ProofStep]> {
		match &self.kind {
			StepKind::Assertion { .. } => None,
			StepKind::Deduction { substeps, .. } | StepKind::Generalization { substeps, .. } => Some(substeps),
		}
	}

	fn substeps_mut(&mut self) -> Option<&mut Vec<ProofStep>> {
		match &mut self.kind {
			StepKind::Assertion { .. } => None,
			StepKind::Deduction { substeps, .. } | StepKind::Generalization { substeps, .. } => Some(substeps),
		}
	}

	fn set_path(&mut self, path: TreePathBuf) {
		if let Some(substeps) = self.substeps_mut() {
			repath(substeps, &path);
		}
		self.path = path;
	}

	/// Что доказывает этот шаг. Дедукция и обобщение записываются определениями с атрибутами `deduction` и `generalization`; если такого нет, не подходит по арности или подшагов нет, то None.
	pub fn proven_statement(&self, tables: &SymbolTables) -> Option<Expression> {
		match &self.kind {
			StepKind::Assertion { statement } => Some(statement.clone()),
			StepKind::Deduction { assumption, substeps } => {
				let last = substeps.last()?.proven_statement(tables)?;
				let definition = tables.definition_with_attribute(DEDUCTION)?;
				if definition.arity != 2 || definition.bound_variables != 0 {
					return None;
				}
				Some(Expression::Defined {
					definition: definition.clone(),
					bound_variables: Vec::new(),
					components: vec![assumption.clone(), last],
				})
			},
			StepKind::Generalization { variables, substeps } => {
				let last = substeps.last()?.proven_statement(tables)?;
				let definition = tables.definition_with_attribute(GENERALIZATION)?;
				if definition.arity != 1 || definition.bound_variables != variables.len() {
					return None;
				}
				Some(Expression::Defined {
					definition: definition.clone(),
					bound_variables: variables.clone(),
					components: vec![last.bind_free_variables(variables)],
				})
			},
		}
	}
}

fn repath(steps: &mut [ProofStep], parent: &TreePath) {
	for (index, step) in steps.iter_mut().enumerate() {
		step.set_path(parent.child(index));
	}
}

/// Список братьев, в котором лежит шаг с путём `parent ++ [i]`.
fn siblings_mut<'s>(steps: &'s mut Vec<ProofStep>, parent: &TreePath) -> Result<&'s mut Vec<ProofStep>, StepError> {
	let mut current = steps;
	for (depth, &index) in parent.0.iter().enumerate() {
		let step = current.get_mut(index).ok_or(StepError::PathOutOfRange { depth, index })?;
		current = step.substeps_mut().ok_or(StepError::NoSubsteps { depth: depth + 1 })?;
	}
	Ok(current)
}

/// Общая часть всех правок: найти список братьев для последнего индекса пути, поправить его через `edit` и заново выставить пути всем шагам.
fn edit_siblings<F>(path: &TreePath, steps: &[ProofStep], edit: F) -> Result<Vec<ProofStep>, StepError>
where
	F: FnOnce(&mut Vec<ProofStep>, usize, usize) -> Result<(), StepError>,
{
	let (parent, index) = path.split_last().ok_or(StepError::EmptyPath)?;
	let mut result = steps.to_vec();
	let siblings = siblings_mut(&mut result, parent)?;
	edit(siblings, index, parent.len())?;
	repath(&mut result, TreePath::root());
	Ok(result)
}

/// Заменить шаг по пути на `new_step`.
pub fn update_step(path: &TreePath, steps: &[ProofStep], new_step: ProofStep) -> Result<Vec<ProofStep>, StepError> {
	tracing::debug!(%path, "updating proof step");
	edit_siblings(path, steps, |siblings, index, depth| {
		let slot = siblings.get_mut(index).ok_or(StepError::PathOutOfRange { depth, index })?;
		*slot = new_step;
		Ok(())
	})
}

/// Заменить шаг по пути на ноль или больше шагов.
pub fn replace_step(path: &TreePath, steps: &[ProofStep], new_steps: Vec<ProofStep>) -> Result<Vec<ProofStep>, StepError> {
	tracing::debug!(%path, inserted = new_steps.len(), "replacing proof step");
	edit_siblings(path, steps, |siblings, index, depth| {
		if index >= siblings.len() {
			return Err(StepError::PathOutOfRange { depth, index });
		}
		siblings.splice(index..index + 1, new_steps);
		Ok(())
	})
}

/// Вставить шаги перед шагом по пути. Индекс, равный числу шагов, добавляет в конец.
pub fn insert_steps(path: &TreePath, steps: &[ProofStep], new_steps: Vec<ProofStep>) -> Result<Vec<ProofStep>, StepError> {
	tracing::debug!(%path, inserted = new_steps.len(), "inserting proof steps");
	edit_siblings(path, steps, |siblings, index, depth| {
		if index > siblings.len() {
			return Err(StepError::PathOutOfRange { depth, index });
		}
		siblings.splice(index..index, new_steps);
		Ok(())
	})
}

/// Заменить подряд идущие шаги от `path` до `end` (не включая) на `new_steps`.
pub fn replace_step_range(path: &TreePath, end: usize, steps: &[ProofStep], new_steps: Vec<ProofStep>) -> Result<Vec<ProofStep>, StepError> {
	tracing::debug!(%path, end, inserted = new_steps.len(), "replacing range of proof steps");
	edit_siblings(path, steps, |siblings, start, _| {
		if start > end || end > siblings.len() {
			return Err(StepError::InvalidRange {
				start,
				end,
				len: siblings.len(),
			});
		}
		siblings.splice(start..end, new_steps);
		Ok(())
	})
}
