use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use log::debug;
use zip::ZipArchive;

/// Something that can find the bytes of a class file by the name of the class.
pub trait ClassLoader {
	/// Looks up a class by its internal name, like `java/lang/Object`.
	///
	/// Returns [`None`] if the class isn't there. Errors are reserved for failing to read a class that is there.
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Loads classes from a directory, `a/b/C` is read from `<root>/a/b/C.class`.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
	root: PathBuf,
}

impl DirectoryLoader {
	pub fn new(root: impl Into<PathBuf>) -> DirectoryLoader {
		DirectoryLoader { root: root.into() }
	}
}

impl ClassLoader for DirectoryLoader {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		let path = self.root.join(format!("{name}.class"));
		if !path.is_file() {
			return Ok(None);
		}
		std::fs::read(&path)
			.map(Some)
			.with_context(|| anyhow!("failed to read class file {path:?}"))
	}
}

/// Loads classes from a jar, or any other zip archive.
///
/// All class files are read into memory when the archive is opened.
pub struct JarLoader {
	path: PathBuf,
	classes: MemoryLoader,
}

impl JarLoader {
	pub fn open(path: impl AsRef<Path>) -> Result<JarLoader> {
		let path = path.as_ref().to_owned();
		let file = File::open(&path)
			.with_context(|| anyhow!("could not open file {path:?}"))?;
		let mut zip = ZipArchive::new(file)
			.with_context(|| anyhow!("failed to read zip archive from {path:?}"))?;

		let mut classes = MemoryLoader::new();
		for index in 0..zip.len() {
			let mut file = zip.by_index(index)?;
			if let Some(name) = file.name().strip_suffix(".class") {
				let name = name.to_owned();

				let mut vec = Vec::new();
				file.read_to_end(&mut vec)
					.with_context(|| anyhow!("failed to read {name:?} from {path:?}"))?;

				classes.insert(name, vec);
			}
		}
		debug!("read {} classes from {path:?}", classes.len());

		Ok(JarLoader { path, classes })
	}
}

impl Debug for JarLoader {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "JarLoader {{ path: {:?}, {} classes }}", self.path, self.classes.len())
	}
}

impl ClassLoader for JarLoader {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		self.classes.load(name)
	}
}

/// Asks each of the loaders in order, the first one that has the class wins.
#[derive(Default)]
pub struct Classpath {
	loaders: Vec<Box<dyn ClassLoader>>,
}

impl Classpath {
	pub fn new() -> Classpath {
		Classpath::default()
	}

	pub fn push(&mut self, loader: impl ClassLoader + 'static) {
		self.loaders.push(Box::new(loader));
	}

	pub fn len(&self) -> usize {
		self.loaders.len()
	}

	pub fn is_empty(&self) -> bool {
		self.loaders.is_empty()
	}
}

impl ClassLoader for Classpath {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		for loader in &self.loaders {
			if let Some(bytes) = loader.load(name)? {
				return Ok(Some(bytes));
			}
		}
		Ok(None)
	}
}

/// Classes held in memory, mostly useful for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
	classes: IndexMap<String, Vec<u8>>,
}

impl MemoryLoader {
	pub fn new() -> MemoryLoader {
		MemoryLoader::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
		self.classes.insert(name.into(), bytes);
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item=&str> {
		self.classes.keys().map(|name| name.as_str())
	}
}

impl ClassLoader for MemoryLoader {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		Ok(self.classes.get(name).cloned())
	}
}

#[cfg(test)]
mod testing {
	use std::io::Write;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use zip::write::SimpleFileOptions;
	use zip::ZipWriter;
	use crate::loader::{ClassLoader, Classpath, DirectoryLoader, JarLoader, MemoryLoader};

	fn temp_dir(name: &str) -> Result<std::path::PathBuf> {
		let dir = std::env::temp_dir().join(format!("dukejs-{name}-{}", std::process::id()));
		std::fs::create_dir_all(&dir)?;
		Ok(dir)
	}

	#[test]
	fn directory() -> Result<()> {
		let dir = temp_dir("directory")?;
		std::fs::create_dir_all(dir.join("a/b"))?;
		std::fs::write(dir.join("a/b/C.class"), [1, 2, 3])?;

		let loader = DirectoryLoader::new(&dir);
		assert_eq!(loader.load("a/b/C")?, Some(vec![1, 2, 3]));
		assert_eq!(loader.load("a/b/D")?, None);
		// a directory is not a class
		assert_eq!(loader.load("a/b")?, None);

		std::fs::remove_dir_all(dir)?;
		Ok(())
	}

	#[test]
	fn jar() -> Result<()> {
		let dir = temp_dir("jar")?;
		let path = dir.join("test.jar");

		let mut zip = ZipWriter::new(std::fs::File::create(&path)?);
		zip.start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())?;
		zip.write_all(b"Manifest-Version: 1.0\n")?;
		zip.start_file("a/B.class", SimpleFileOptions::default())?;
		zip.write_all(&[0xca, 0xfe])?;
		zip.finish()?;

		let loader = JarLoader::open(&path)?;
		assert_eq!(loader.load("a/B")?, Some(vec![0xca, 0xfe]));
		assert_eq!(loader.load("META-INF/MANIFEST")?, None);

		std::fs::remove_dir_all(dir)?;
		Ok(())
	}

	#[test]
	fn first_hit_wins() -> Result<()> {
		let mut first = MemoryLoader::new();
		first.insert("A", vec![1]);
		let mut second = MemoryLoader::new();
		second.insert("A", vec![2]);
		second.insert("B", vec![3]);

		let mut classpath = Classpath::new();
		classpath.push(first);
		classpath.push(second);

		assert_eq!(classpath.load("A")?, Some(vec![1]));
		assert_eq!(classpath.load("B")?, Some(vec![3]));
		assert_eq!(classpath.load("C")?, None);
		Ok(())
	}
}
