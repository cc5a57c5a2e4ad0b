//! An ahead-of-time translator from java class files to javascript.
//!
//! Given some entry classes and a way to load classes, [`compile`] finds every class they need, translates their
//! methods into javascript functions, and writes them out together with the part of the runtime they use:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use dukejs::{compile, DirectoryLoader, Options};
//! use duke::tree::class::ClassName;
//!
//! let loader = DirectoryLoader::new("build/classes");
//! let mut out = Vec::new();
//! compile(&mut out, &[ClassName::from("org/example/Main")], &loader, &Options::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! All errors are [`anyhow::Error`]s, the ones specific to translating are [`CompileError`]s.

pub mod cfg;
pub mod mangle;
pub mod runtime;
pub mod translate;
mod closure;
mod emit;
mod error;
mod hierarchy;
mod initialization;
mod js;
mod loader;
mod natives;
mod structure;

use std::io::Write;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexSet;
use log::{debug, info};
use duke::tree::class::ClassName;
use duke::tree::method::Method;
use crate::js::Js;
use crate::runtime::{Feature, Features};

pub use closure::{close_over, Reachability};
pub use error::CompileError;
pub use hierarchy::Hierarchy;
pub use loader::{ClassLoader, Classpath, DirectoryLoader, JarLoader, MemoryLoader};
pub use natives::{NativeBodies, NativeBody, JAVA_SCRIPT_BODY};

/// What [`compile`] should do besides translating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
	/// Classes that exist at run time already. These are never loaded, and references to them are left as they are.
	///
	/// Defaults to the classes the runtime defines, see [`runtime::builtin_classes`]. A builtin class that's left out
	/// here is loaded and translated like any other class.
	pub provided: IndexSet<ClassName>,
	/// Javascript bodies for methods, these win over `JavaScriptBody` annotations.
	pub natives: NativeBodies,
}

impl Default for Options {
	fn default() -> Options {
		Options {
			provided: runtime::builtin_classes().map(ClassName::from).collect(),
			natives: NativeBodies::new(),
		}
	}
}

/// Translates the entry classes and everything they reference, writing a single javascript program to `out`.
///
/// The program is made up of the runtime, the classes in the order they were reached, a call linking them, and then
/// the static initializers. An initializer runs after those of its super class and of the classes it uses.
pub fn compile(out: &mut impl Write, entries: &[ClassName], loader: &dyn ClassLoader, options: &Options) -> Result<()> {
	info!("compiling {} entry classes", entries.len());

	let reachability = close_over(entries, loader, &options.provided)?;
	info!("found {} classes to translate, {} provided ones are referenced", reachability.classes.len(), reachability.provided.len());

	let hierarchy = Hierarchy::new(&reachability.classes);

	let mut features = Features::new();
	features.insert(Feature::ClassModel);
	for name in &reachability.provided {
		if let Some(feature) = runtime::builtin_feature(name.as_str()) {
			features.insert(feature);
		}
	}

	let mut classes = Js::new();
	for class in reachability.classes.values() {
		debug!("translating class {}", class.name);
		emit::emit_class(&mut classes, class, &hierarchy, &options.natives, &mut features)
			.with_context(|| anyhow!("failed to translate class {}", class.name))?;
	}

	let initializers = initialization::order(&reachability.classes)?;
	debug!("running {} static initializers", initializers.len());

	let runtime = runtime::emit(&features, &options.provided, &reachability.classes);
	let classes = classes.finish();
	debug!("the runtime is {} bytes, the classes are {} bytes", runtime.len(), classes.len());

	out.write_all(runtime.as_bytes())?;
	out.write_all(classes.as_bytes())?;
	writeln!(out, "$vm.link();")?;
	for class in initializers {
		writeln!(out, "{}();", mangle::static_method(class.as_str(), Method::CLINIT, "()V")?)?;
	}
	info!("wrote {} bytes of javascript", runtime.len() + classes.len());
	Ok(())
}
