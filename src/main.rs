use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser};
use log::{info, warn, LevelFilter};
use serde::Deserialize;
use walkdir::WalkDir;
use duke::tree::class::ClassName;
use dukejs::{compile, Classpath, DirectoryLoader, JarLoader, NativeBodies, NativeBody, Options};

#[derive(Debug, Parser)]
#[command(version, about = "Translates java class files into a single javascript program")]
struct Cli {
	/// Be verbose. Give it twice to also see every translated method.
	#[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
	verbose: u8,

	/// A directory or a jar to load classes from, searched in the order given.
	#[arg(short = 'c', long = "classpath", required = true)]
	classpath: Vec<PathBuf>,

	/// Where to write the javascript to. Standard output if not given.
	#[arg(short = 'o', long = "output")]
	output: Option<PathBuf>,

	/// A json file with javascript bodies for native methods.
	#[arg(long = "natives")]
	natives: Option<PathBuf>,

	/// A class that already exists at run time, and is not translated.
	#[arg(long = "provided")]
	provided: Vec<String>,

	/// Translate the classes the runtime defines too, if they're found on the classpath.
	#[arg(long = "no-default-provided")]
	no_default_provided: bool,

	/// The classes to start from, like `org.example.Main` or `org/example/Main`.
	///
	/// If none are given, every class in the classpath directories is used.
	entries: Vec<String>,
}

/// One entry of the `--natives` file.
#[derive(Debug, Deserialize)]
struct NativeEntry {
	class: String,
	method: String,
	descriptor: String,
	#[serde(default)]
	args: Vec<String>,
	body: String,
}

fn class_name(name: &str) -> ClassName {
	let name = name.strip_suffix(".class").unwrap_or(name);
	ClassName::from(name.replace('.', "/"))
}

fn parse_natives(entries: Vec<NativeEntry>) -> NativeBodies {
	let mut natives = NativeBodies::new();
	for entry in entries {
		let class = class_name(&entry.class);
		natives.insert(class.as_str(), &entry.method, &entry.descriptor, NativeBody {
			args: entry.args,
			body: entry.body,
		});
	}
	natives
}

fn read_natives(path: &Path) -> Result<NativeBodies> {
	let file = File::open(path)
		.with_context(|| anyhow!("failed to open natives file {path:?}"))?;
	let entries: Vec<NativeEntry> = serde_json::from_reader(BufReader::new(file))
		.with_context(|| anyhow!("failed to parse natives file {path:?}"))?;
	Ok(parse_natives(entries))
}

/// Finds all `.class` files below `root`, giving their class names.
fn find_classes(root: &Path) -> Result<Vec<ClassName>> {
	let files: Vec<PathBuf> = WalkDir::new(root)
		.sort_by_file_name()
		.into_iter()
		.filter(|res| res.as_ref().is_ok_and(|entry| {
			entry.file_type().is_file() && entry.path().extension().is_some_and(|x| x == "class")
		}))
		.map(|res| res.map(|entry| entry.into_path()))
		.collect::<Result<_, walkdir::Error>>()
		.with_context(|| anyhow!("failed to get class files (recursively) for directory {root:?}"))?;

	files.iter()
		.map(|file| {
			let relative = file.strip_prefix(root)
				.with_context(|| anyhow!("class file {file:?} is not inside {root:?}"))?
				.with_extension("");
			let parts: Vec<&str> = relative.components()
				.map(|x| x.as_os_str().to_str().with_context(|| anyhow!("class file path {file:?} is not valid unicode")))
				.collect::<Result<_>>()?;
			Ok(ClassName::from(parts.join("/")))
		})
		.collect()
}

fn setup_logging(verbose: u8) -> Result<()> {
	let level = match verbose {
		0 => LevelFilter::Warn,
		1 => LevelFilter::Info,
		2 => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	};

	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()?;
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_logging(cli.verbose)?;

	let mut classpath = Classpath::new();
	let mut directories = Vec::new();
	for path in &cli.classpath {
		if path.is_dir() {
			classpath.push(DirectoryLoader::new(path));
			directories.push(path.as_path());
		} else if path.is_file() {
			classpath.push(JarLoader::open(path)?);
		} else {
			warn!("classpath entry {path:?} doesn't exist, ignoring it");
		}
	}

	let entries = if cli.entries.is_empty() {
		let mut entries = Vec::new();
		for directory in directories {
			entries.extend(find_classes(directory)?);
		}
		info!("found {} classes in the classpath directories", entries.len());
		entries
	} else {
		cli.entries.iter().map(|x| class_name(x)).collect()
	};
	if entries.is_empty() {
		bail!("no classes to translate: give some entry classes, or a classpath directory containing class files");
	}

	let mut options = Options::default();
	if cli.no_default_provided {
		options.provided.clear();
	}
	options.provided.extend(cli.provided.iter().map(|x| class_name(x)));
	if let Some(path) = &cli.natives {
		options.natives = read_natives(path)?;
	}

	match &cli.output {
		Some(path) => {
			let file = File::create(path)
				.with_context(|| anyhow!("failed to create output file {path:?}"))?;
			let mut out = BufWriter::new(file);
			compile(&mut out, &entries, &classpath, &options)?;
			out.flush()
				.with_context(|| anyhow!("failed to write output file {path:?}"))?;
		},
		None => {
			let mut out = std::io::stdout().lock();
			compile(&mut out, &entries, &classpath, &options)?;
			out.flush()?;
		},
	}

	Ok(())
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::{class_name, parse_natives, NativeEntry};

	#[test]
	fn class_names() {
		assert_eq!(class_name("org.example.Main").to_string(), "org/example/Main");
		assert_eq!(class_name("org/example/Main").to_string(), "org/example/Main");
		assert_eq!(class_name("org/example/Main.class").to_string(), "org/example/Main");
	}

	#[test]
	fn natives_file() -> Result<()> {
		let json = r#"[
			{ "class": "org.example.Math", "method": "add", "descriptor": "(II)I", "args": ["a", "b"], "body": "return a + b;" },
			{ "class": "org/example/Clock", "method": "now", "descriptor": "()D", "body": "return Date.now();" }
		]"#;
		let entries: Vec<NativeEntry> = serde_json::from_str(json)?;
		let natives = parse_natives(entries);

		assert_eq!(natives.len(), 2);
		let add = natives.get("org/example/Math", "add", "(II)I");
		assert_eq!(add.map(|x| x.args.clone()), Some(vec!["a".to_owned(), "b".to_owned()]));
		let now = natives.get("org/example/Clock", "now", "()D");
		assert_eq!(now.map(|x| x.body.as_str()), Some("return Date.now();"));
		assert!(now.is_some_and(|x| x.args.is_empty()));
		Ok(())
	}
}
