use std::collections::{HashSet, VecDeque};
use anyhow::{anyhow, bail, Context, Result};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use duke::tree::class::ClassFile;
use duke::tree::class::ClassName;
use duke::tree::method::code::{Instruction, Loadable};
use crate::error::CompileError;
use crate::loader::ClassLoader;

/// The classes needed by a set of entry classes.
#[derive(Debug, Clone, Default)]
pub struct Reachability {
	/// The loaded classes, in the order they were first reached. This is also the order they're emitted in.
	pub classes: IndexMap<ClassName, ClassFile>,
	/// The provided classes that were referenced, in the order they were first reached. These are never loaded.
	pub provided: IndexSet<ClassName>,
}

/// Loads the entry classes and everything they (transitively) reference.
///
/// The classes are visited breadth first. Classes in `provided` are recorded but not loaded. A class that is needed but
/// can't be loaded is a [`CompileError::MissingDependency`].
pub fn close_over(entries: &[ClassName], loader: &dyn ClassLoader, provided: &IndexSet<ClassName>) -> Result<Reachability> {
	let mut reachability = Reachability::default();

	let mut seen: HashSet<ClassName> = HashSet::new();
	let mut queue: VecDeque<(ClassName, Option<ClassName>)> = VecDeque::new();
	for entry in entries {
		if seen.insert(entry.clone()) {
			queue.push_back((entry.clone(), None));
		}
	}

	while let Some((name, referenced_from)) = queue.pop_front() {
		if provided.contains(&name) {
			reachability.provided.insert(name);
			continue;
		}

		let Some(bytes) = loader.load(name.as_str())? else {
			return Err(CompileError::MissingDependency {
				class: name.to_string(),
				member: None,
				referenced_from: referenced_from.map(|x| x.to_string()),
			}.into());
		};
		let class = duke::parse(&bytes)
			.with_context(|| anyhow!("failed to read class {name}"))?;
		if class.name != name {
			bail!("class file for {name} contains class {}", class.name);
		}
		debug!("loaded class {name}");

		let references = references(&class)
			.with_context(|| anyhow!("failed to collect the references of class {name}"))?;
		for reference in references {
			if seen.insert(reference.clone()) {
				queue.push_back((reference, Some(name.clone())));
			}
		}

		reachability.classes.insert(name, class);
	}

	Ok(reachability)
}

/// All the classes a class refers to, in the order they appear, with duplicates.
///
/// Array classes are replaced by the class of their elements, and left out for primitive arrays.
fn references(class: &ClassFile) -> Result<Vec<ClassName>> {
	let mut out = Vec::new();
	out.extend(class.super_class.iter().cloned());
	out.extend(class.interfaces.iter().cloned());

	for method in &class.methods {
		let Some(code) = &method.code else { continue };

		let instructions = code.decode(&class.pool)
			.with_context(|| anyhow!("failed to decode method {}{}", method.name, method.descriptor))?;
		for insn in instructions {
			let class = match insn.instruction {
				Instruction::GetStatic(field) | Instruction::PutStatic(field) |
				Instruction::GetField(field) | Instruction::PutField(field) => field.class,
				Instruction::InvokeVirtual(method) | Instruction::InvokeSpecial(method, _) |
				Instruction::InvokeStatic(method, _) | Instruction::InvokeInterface(method) => method.class,
				Instruction::New(class) | Instruction::ANewArray(class) |
				Instruction::CheckCast(class) | Instruction::InstanceOf(class) |
				Instruction::MultiANewArray(class, _) |
				Instruction::Ldc(Loadable::Class(class)) => class,
				_ => continue,
			};
			out.extend(class.element_class());
		}

		for handler in &code.exception_table {
			out.extend(handler.catch.iter().cloned());
		}
	}

	Ok(out)
}
