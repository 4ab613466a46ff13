use std::borrow::Borrow;
use std::fmt;
use std::num::ParseIntError;
use std::ops::Deref;
use std::str::FromStr;

/// Путь в дереве: последовательность индексов детей, начиная от корня. Используется и для выражений, и для деревьев шагов доказательства.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TreePathBuf(pub Vec<usize>);

/// Путь для передачи в функции. Аналог `[usize]`, относится к `TreePathBuf` как `Path` к `PathBuf`.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TreePath(pub [usize]);

impl TreePath {
	/// Создать ссылку на `TreePath` из слайса на `usize`.
	pub fn from_slice(slice: &[usize]) -> &Self {
		unsafe { &*(slice as *const [usize] as *const TreePath) }
	}

	/// Путь к корню.
	pub fn root() -> &'static Self {
		Self::from_slice(&[])
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Отделить первый индекс от остатка пути.
	pub fn split_first(&self) -> Option<(usize, &TreePath)> {
		match &self.0 {
			[first, tail @ ..] => Some((*first, TreePath::from_slice(tail))),
			[] => None,
		}
	}

	/// Путь к родителю и индекс узла среди его братьев.
	pub fn split_last(&self) -> Option<(&TreePath, usize)> {
		match &self.0 {
			[init @ .., last] => Some((TreePath::from_slice(init), *last)),
			[] => None,
		}
	}

	/// Путь к ребёнку с индексом `index`.
	pub fn child(&self, index: usize) -> TreePathBuf {
		let mut result = self.to_owned();
		result.0.push(index);
		result
	}

	/// Конкатенация двух путей.
	pub fn join(&self, tail: &TreePath) -> TreePathBuf {
		let mut result = self.to_owned();
		result.0.extend_from_slice(&tail.0);
		result
	}
}

impl ToOwned for TreePath {
	type Owned = TreePathBuf;

	fn to_owned(&self) -> TreePathBuf {
		TreePathBuf(self.0.to_vec())
	}
}

impl TreePathBuf {
	pub fn new() -> Self {
		Self::default()
	}

	/// Путь из `count` нулей. Так в развёрнутой конъюнкции выглядит спуск к самому левому узлу.
	pub fn zeros(count: usize) -> Self {
		TreePathBuf(vec![0; count])
	}

	/// Добавить индекс в конец пути.
	pub fn then(mut self, index: usize) -> Self {
		self.0.push(index);
		self
	}

	pub fn as_path(&self) -> &TreePath {
		TreePath::from_slice(&self.0)
	}
}

impl Borrow<TreePath> for TreePathBuf {
	fn borrow(&self) -> &TreePath {
		self.as_path()
	}
}

impl Deref for TreePathBuf {
	type Target = TreePath;

	fn deref(&self) -> &TreePath {
		self.as_path()
	}
}

impl From<Vec<usize>> for TreePathBuf {
	fn from(indices: Vec<usize>) -> Self {
		TreePathBuf(indices)
	}
}

/// Индексы через точку: `0.1.2`. Пустая строка означает корень.
impl FromStr for TreePathBuf {
	type Err = ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(TreePathBuf::new());
		}
		s.split('.').map(str::parse).collect::<Result<Vec<usize>, _>>().map(TreePathBuf)
	}
}

impl fmt::Display for TreePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[")?;
		for (position, index) in self.0.iter().enumerate() {
			if position != 0 {
				write!(f, ", ")?;
			}
			write!(f, "{}", index)?;
		}
		write!(f, "]")
	}
}

impl fmt::Display for TreePathBuf {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self.as_path(), f)
	}
}

/// Приписать `prefix` к каждому из путей.
pub fn prefix_all(prefix: &TreePath, paths: Vec<TreePathBuf>) -> Vec<TreePathBuf> {
	paths
		.into_iter()
		.map(|path| prefix.join(&path))
		.collect()
}

/// Размножить пути: каждый из `tails` приписывается к каждому из `prefixes`. Порядок определяется сначала префиксом, потом хвостом.
pub fn fan_out(prefixes: &[TreePathBuf], tails: &[TreePathBuf]) -> Vec<TreePathBuf> {
	prefixes
		.iter()
		.flat_map(|prefix| tails.iter().map(move |tail| prefix.join(tail)))
		.collect()
}
