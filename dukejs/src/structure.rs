//! Puts the translated blocks of a method back together.
//!
//! Reducible graphs become nested loops and labeled blocks, following the dominator tree: a loop header opens a
//! `while (true)` labeled `L<offset>`, and each child in the dominator tree that has more than one forward predecessor
//! gets a block labeled `B<offset>` which is broken out of to reach it. Backward edges become `continue`.
//!
//! Irreducible graphs are emitted as a `switch` over the offset of the current block inside an endless loop.

use anyhow::Result;
use log::trace;
use crate::cfg::{ControlFlow, Handler};
use crate::error::CompileError;
use crate::js::Js;
use crate::translate::{class_literal, BlockCode, Exit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	Structured,
	Dispatch,
}

pub(crate) fn emit(js: &mut Js, cfg: &ControlFlow, code: &[Option<BlockCode>]) -> Result<()> {
	if cfg.is_reducible() {
		trace!("emitting {} blocks as structured code", cfg.blocks.len());
		Emitter { js, cfg, code, mode: Mode::Structured }.tree(cfg.entry())
	} else {
		trace!("emitting {} blocks with a dispatch loop", cfg.blocks.len());
		Emitter { js, cfg, code, mode: Mode::Dispatch }.dispatch()
	}
}

struct Emitter<'a, 'b> {
	js: &'b mut Js,
	cfg: &'a ControlFlow,
	code: &'a [Option<BlockCode>],
	mode: Mode,
}

impl<'a> Emitter<'a, '_> {
	fn start(&self, block: usize) -> u16 {
		self.cfg.blocks[block].start
	}

	fn code(&self, block: usize) -> Result<&'a BlockCode> {
		self.code[block].as_ref()
			.ok_or_else(|| CompileError::control_flow(self.start(block), "block was never translated").into())
	}

	fn target(&self, offset: u16) -> Result<usize> {
		self.cfg.block_at(offset)
			.ok_or_else(|| CompileError::control_flow(offset, "no block starts here").into())
	}

	/// Emits the block and everything it dominates.
	fn tree(&mut self, block: usize) -> Result<()> {
		// highest in reverse postorder first, so that the earliest one is the innermost
		let merges: Vec<usize> = self.cfg.dominator_children(block).iter()
			.copied()
			.filter(|&child| self.cfg.is_merge(child))
			.rev()
			.collect();

		if self.cfg.is_loop_header(block) {
			self.js.open(format!("L{}: while (true) {{", self.start(block)));
			self.within(block, &merges)?;
			self.js.close("}");
			Ok(())
		} else {
			self.within(block, &merges)
		}
	}

	fn within(&mut self, block: usize, merges: &[usize]) -> Result<()> {
		match merges.split_first() {
			Some((&merge, rest)) => {
				self.js.open(format!("B{}: {{", self.start(merge)));
				self.within(block, rest)?;
				self.js.close("}");
				self.tree(merge)
			},
			None => self.block(block),
		}
	}

	fn jump(&mut self, from: usize, to: usize) -> Result<()> {
		match self.mode {
			Mode::Dispatch => {
				self.js.line(format!("pc = {}; continue;", self.start(to)));
				Ok(())
			},
			Mode::Structured if self.cfg.is_backward(from, to) => {
				self.js.line(format!("continue L{};", self.start(to)));
				Ok(())
			},
			Mode::Structured if self.cfg.is_merge(to) => {
				self.js.line(format!("break B{};", self.start(to)));
				Ok(())
			},
			Mode::Structured => self.tree(to),
		}
	}

	fn block(&mut self, block: usize) -> Result<()> {
		let cfg = self.cfg;
		let code = self.code(block)?;
		let handlers = &cfg.handlers[block];

		if handlers.is_empty() || self.mode == Mode::Dispatch {
			for statement in &code.statements {
				self.js.line(statement);
			}
		} else {
			self.js.open("try {");
			for statement in &code.statements {
				self.js.line(statement);
			}
			self.js.reopen("} catch ($e) {");
			self.js.line("$e = $vm.wrap($e);");
			self.catch(block, handlers)?;
			self.js.close("}");
		}

		self.exit(block, &code.exit)
	}

	/// Tries the handlers in order, rethrowing if none matches.
	fn catch(&mut self, block: usize, handlers: &[Handler]) -> Result<()> {
		for (index, (target, classes)) in handler_groups(handlers).into_iter().enumerate() {
			match classes {
				Some(classes) => {
					let condition = is_any(&classes);
					if index == 0 {
						self.js.open(format!("if ({condition}) {{"));
					} else {
						self.js.reopen(format!("}} else if ({condition}) {{"));
					}
					self.js.line("sa0 = $e;");
					self.jump(block, target)?;
				},
				None if index == 0 => {
					self.js.line("sa0 = $e;");
					return self.jump(block, target);
				},
				None => {
					self.js.reopen("} else {");
					self.js.line("sa0 = $e;");
					self.jump(block, target)?;
					self.js.close("}");
					return Ok(());
				},
			}
		}
		self.js.reopen("} else {");
		self.js.line("throw $e;");
		self.js.close("}");
		Ok(())
	}

	fn exit(&mut self, block: usize, exit: &Exit) -> Result<()> {
		match exit {
			Exit::Goto(target) => {
				let target = self.target(*target)?;
				self.jump(block, target)?;
			},
			Exit::If { condition, target, otherwise } => {
				let target = self.target(*target)?;
				let otherwise = self.target(*otherwise)?;
				if target == otherwise {
					self.jump(block, target)?;
				} else {
					self.js.open(format!("if ({condition}) {{"));
					self.jump(block, target)?;
					self.js.reopen("} else {");
					self.jump(block, otherwise)?;
					self.js.close("}");
				}
			},
			Exit::Switch { key, cases, default } => {
				// target, keys, and whether it's the default
				let mut groups: Vec<(usize, Vec<i32>, bool)> = Vec::new();
				for &(value, target) in cases {
					let target = self.target(target)?;
					match groups.iter_mut().find(|(t, _, _)| *t == target) {
						Some((_, values, _)) => values.push(value),
						None => groups.push((target, vec![value], false)),
					}
				}
				let default = self.target(*default)?;
				match groups.iter_mut().find(|(t, _, _)| *t == default) {
					Some((_, _, is_default)) => *is_default = true,
					None => groups.push((default, Vec::new(), true)),
				}

				self.js.open(format!("switch ({key}) {{"));
				for (target, values, is_default) in groups {
					let mut labels: Vec<String> = values.iter().map(|value| format!("case {value}:")).collect();
					if is_default {
						labels.push("default:".to_owned());
					}
					self.js.open(format!("{} {{", labels.join(" ")));
					self.jump(block, target)?;
					self.js.close("}");
				}
				self.js.close("}");
			},
			Exit::Return(Some(value)) => self.js.line(format!("return {value};")),
			Exit::Return(None) => self.js.line("return;"),
			Exit::Throw => {},
		}
		Ok(())
	}

	/// Emits all reachable blocks as cases of a `switch` on `pc`, in the order of their offsets.
	fn dispatch(&mut self) -> Result<()> {
		let cfg = self.cfg;
		let protected: Vec<usize> = (0..cfg.blocks.len())
			.filter(|&block| cfg.is_reachable(block) && !cfg.handlers[block].is_empty())
			.collect();

		self.js.line(format!("var pc = {};", self.start(cfg.entry())));
		self.js.open("for (;;) {");
		if !protected.is_empty() {
			self.js.open("try {");
		}
		self.js.open("switch (pc) {");
		for block in (0..cfg.blocks.len()).filter(|&block| cfg.is_reachable(block)) {
			self.js.open(format!("case {}: {{", self.start(block)));
			self.block(block)?;
			self.js.close("}");
		}
		self.js.close("}");

		if !protected.is_empty() {
			self.js.reopen("} catch ($e) {");
			self.js.line("$e = $vm.wrap($e);");
			for block in protected {
				self.js.open(format!("if (pc === {}) {{", self.start(block)));
				for (target, classes) in handler_groups(&cfg.handlers[block]) {
					let target = self.start(target);
					match classes {
						Some(classes) => {
							self.js.open(format!("if ({}) {{", is_any(&classes)));
							self.js.line("sa0 = $e;");
							self.js.line(format!("pc = {target}; continue;"));
							self.js.close("}");
						},
						None => {
							self.js.line("sa0 = $e;");
							self.js.line(format!("pc = {target}; continue;"));
							break;
						},
					}
				}
				self.js.close("}");
			}
			self.js.line("throw $e;");
			self.js.close("}");
		}
		self.js.close("}");
		Ok(())
	}
}

/// Merges consecutive handlers with the same target. Each group is the target and the classes caught, [`None`] if it
/// catches everything.
fn handler_groups(handlers: &[Handler]) -> Vec<(usize, Option<Vec<&str>>)> {
	let mut groups: Vec<(usize, Option<Vec<&str>>)> = Vec::new();
	for handler in handlers {
		let catch = handler.catch.as_ref().map(|class| class.as_str());
		match groups.last_mut() {
			Some((target, classes)) if *target == handler.target => match (classes, catch) {
				(Some(classes), Some(class)) => classes.push(class),
				(classes, _) => *classes = None,
			},
			_ => groups.push((handler.target, catch.map(|class| vec![class]))),
		}
	}
	groups
}

fn is_any(classes: &[&str]) -> String {
	classes.iter()
		.map(|class| format!("$vm.isInst($e, {})", class_literal(class)))
		.collect::<Vec<_>>()
		.join(" || ")
}
