//! The control flow graph of a method, made up of basic blocks.
//!
//! Besides the graph itself, this computes what's needed to turn the graph back into structured javascript: a reverse
//! postorder, the dominator tree, loop headers and merge points, and whether the graph is reducible at all.

use std::collections::BTreeSet;
use std::ops::Range;
use anyhow::Result;
use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use duke::tree::class::ClassName;
use duke::tree::method::code::{ExceptionHandler, Insn};
use crate::error::CompileError;

/// A run of instructions that's only entered at the top and only left at the bottom (or by an exception).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
	/// The offset of the first instruction.
	pub start: u16,
	/// The offset after the last instruction.
	pub end: u16,
	/// The indices of the instructions in the list given to [`ControlFlow::build`].
	pub insns: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
	/// [`None`] catches everything.
	pub catch: Option<ClassName>,
	/// The index of the block handling the exception.
	pub target: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
	Normal,
	Exception,
}

#[derive(Debug)]
pub struct ControlFlow {
	/// Ordered by their start.
	pub blocks: Vec<Block>,
	/// Where each block may continue, not counting exceptions. Has no duplicates.
	pub successors: Vec<Vec<usize>>,
	/// The handlers covering each block, in the order they're tried.
	pub handlers: Vec<Vec<Handler>>,

	graph: DiGraph<usize, Edge>,
	order: Vec<usize>,
	rpo_number: Vec<Option<usize>>,
	dominators: Dominators<NodeIndex>,
	dominator_children: Vec<Vec<usize>>,
	forward_predecessors: Vec<usize>,
	loop_headers: Vec<bool>,
	reducible: bool,
}

fn check_start(insns: &[Insn], offset: u16, at: u16, what: &str) -> Result<()> {
	if insns.binary_search_by_key(&offset, |insn| insn.offset).is_err() {
		return Err(CompileError::control_flow(at, format!("{what} {offset} is not the start of an instruction")).into());
	}
	Ok(())
}

fn push_unique(vec: &mut Vec<usize>, value: usize) {
	if !vec.contains(&value) {
		vec.push(value);
	}
}

impl ControlFlow {
	/// Splits the instructions into blocks and analyses the graph they form.
	///
	/// Fails with [`CompileError::MalformedControlFlow`] if a branch target or a boundary of an exception handler isn't
	/// the start of an instruction, or if the last instruction can fall through to after the code.
	pub fn build(insns: &[Insn], exception_table: &[ExceptionHandler], code_length: usize) -> Result<ControlFlow> {
		let Some(first) = insns.first() else {
			return Err(CompileError::control_flow(0, "there are no instructions").into());
		};
		let code_end = u16::try_from(code_length)
			.map_err(|_| CompileError::control_flow(0, format!("code length {code_length} is too large")))?;

		let mut leaders = BTreeSet::new();
		leaders.insert(first.offset);
		for (index, insn) in insns.iter().enumerate() {
			let targets = insn.instruction.branch_targets();
			for &target in &targets {
				check_start(insns, target, insn.offset, "branch target")?;
				leaders.insert(target);
			}
			if !targets.is_empty() || !insn.instruction.falls_through() {
				if let Some(next) = insns.get(index + 1) {
					leaders.insert(next.offset);
				}
			}
		}
		let exception_table: Vec<_> = exception_table.iter()
			.filter(|handler| handler.start < handler.end)
			.collect();
		for handler in &exception_table {
			check_start(insns, handler.start, handler.start, "start of exception range")?;
			leaders.insert(handler.start);
			if handler.end < code_end {
				check_start(insns, handler.end, handler.end, "end of exception range")?;
				leaders.insert(handler.end);
			}
			check_start(insns, handler.handler, handler.handler, "exception handler")?;
			leaders.insert(handler.handler);
		}

		let mut blocks = Vec::new();
		let mut block_start = 0;
		for index in 1..=insns.len() {
			if let Some(insn) = insns.get(index) {
				if !leaders.contains(&insn.offset) {
					continue;
				}
			}
			blocks.push(Block {
				start: insns[block_start].offset,
				end: insns.get(index).map_or(code_end, |insn| insn.offset),
				insns: block_start..index,
			});
			block_start = index;
		}

		let block_at = |offset: u16| blocks.binary_search_by_key(&offset, |block| block.start).ok();
		let missing_block = |offset: u16| CompileError::control_flow(offset, "no block starts here");

		let mut successors = Vec::with_capacity(blocks.len());
		let mut handlers = Vec::with_capacity(blocks.len());
		for block in &blocks {
			let last = &insns[block.insns.end - 1];

			let mut targets = Vec::new();
			for target in last.instruction.branch_targets() {
				push_unique(&mut targets, block_at(target).ok_or_else(|| missing_block(target))?);
			}
			if last.instruction.falls_through() {
				if block.insns.end == insns.len() {
					return Err(CompileError::control_flow(last.offset, "execution falls off the end of the code").into());
				}
				push_unique(&mut targets, block_at(block.end).ok_or_else(|| missing_block(block.end))?);
			}
			successors.push(targets);

			let mut covering = Vec::new();
			for handler in exception_table.iter().filter(|handler| handler.covers(block.start)) {
				covering.push(Handler {
					catch: handler.catch.clone(),
					target: block_at(handler.handler).ok_or_else(|| missing_block(handler.handler))?,
				});
			}
			handlers.push(covering);
		}

		let mut graph = DiGraph::with_capacity(blocks.len(), blocks.len() * 2);
		for index in 0..blocks.len() {
			graph.add_node(index);
		}
		for (index, (targets, covering)) in successors.iter().zip(&handlers).enumerate() {
			for &target in targets {
				graph.add_edge(NodeIndex::new(index), NodeIndex::new(target), Edge::Normal);
			}
			let mut exception_targets = Vec::new();
			for handler in covering {
				push_unique(&mut exception_targets, handler.target);
			}
			for target in exception_targets {
				graph.add_edge(NodeIndex::new(index), NodeIndex::new(target), Edge::Exception);
			}
		}

		let entry = NodeIndex::new(0);
		let mut order = Vec::new();
		let mut dfs = DfsPostOrder::new(&graph, entry);
		while let Some(node) = dfs.next(&graph) {
			order.push(node.index());
		}
		order.reverse();

		let mut rpo_number = vec![None; blocks.len()];
		for (number, &block) in order.iter().enumerate() {
			rpo_number[block] = Some(number);
		}

		let dominators = dominators::simple_fast(&graph, entry);

		let mut dominator_children = vec![Vec::new(); blocks.len()];
		for &block in &order {
			if let Some(parent) = dominators.immediate_dominator(NodeIndex::new(block)) {
				dominator_children[parent.index()].push(block);
			}
		}

		let mut control_flow = ControlFlow {
			blocks,
			successors,
			handlers,
			graph,
			order,
			rpo_number,
			dominators,
			dominator_children,
			forward_predecessors: Vec::new(),
			loop_headers: Vec::new(),
			reducible: true,
		};
		control_flow.classify_edges();
		Ok(control_flow)
	}

	fn classify_edges(&mut self) {
		let mut forward_predecessors = vec![0; self.blocks.len()];
		let mut loop_headers = vec![false; self.blocks.len()];
		let mut reducible = true;

		for edge in self.graph.edge_references() {
			let (from, to) = (edge.source().index(), edge.target().index());
			if self.rpo_number[from].is_none() {
				continue;
			}
			if self.is_backward(from, to) {
				loop_headers[to] = true;
				if !self.dominates(to, from) {
					reducible = false;
				}
			} else {
				forward_predecessors[to] += 1;
			}
		}

		self.forward_predecessors = forward_predecessors;
		self.loop_headers = loop_headers;
		self.reducible = reducible;
	}

	pub fn entry(&self) -> usize {
		0
	}

	/// The index of the block starting at the offset.
	pub fn block_at(&self, offset: u16) -> Option<usize> {
		self.blocks.binary_search_by_key(&offset, |block| block.start).ok()
	}

	/// The blocks reachable from the entry, in reverse postorder.
	pub fn reverse_postorder(&self) -> &[usize] {
		&self.order
	}

	pub fn is_reachable(&self, block: usize) -> bool {
		self.rpo_number[block].is_some()
	}

	/// Whether the edge goes back to something visited before in reverse postorder (or to itself).
	pub fn is_backward(&self, from: usize, to: usize) -> bool {
		match (self.rpo_number[from], self.rpo_number[to]) {
			(Some(from), Some(to)) => to <= from,
			_ => false,
		}
	}

	/// Whether every path from the entry to `b` goes through `a`. Every block dominates itself.
	pub fn dominates(&self, a: usize, b: usize) -> bool {
		self.dominators.dominators(NodeIndex::new(b))
			.is_some_and(|mut iter| iter.any(|node| node.index() == a))
	}

	pub fn immediate_dominator(&self, block: usize) -> Option<usize> {
		self.dominators.immediate_dominator(NodeIndex::new(block))
			.map(|node| node.index())
	}

	/// The blocks immediately dominated by the block, in reverse postorder.
	pub fn dominator_children(&self, block: usize) -> &[usize] {
		&self.dominator_children[block]
	}

	/// Whether a backward edge goes to the block.
	pub fn is_loop_header(&self, block: usize) -> bool {
		self.loop_headers[block]
	}

	/// Whether at least two forward edges go to the block. An exception edge counts separately from a normal edge.
	pub fn is_merge(&self, block: usize) -> bool {
		self.forward_predecessors[block] >= 2
	}

	/// Whether every backward edge goes to a block dominating its source. Only reducible graphs can be expressed with
	/// loops and blocks.
	pub fn is_reducible(&self) -> bool {
		self.reducible
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use raw_class_file::{insn, Asm};
	use duke::ConstantPool;
	use duke::tree::class::ClassName;
	use duke::tree::method::code::ExceptionHandler;
	use crate::cfg::ControlFlow;
	use crate::error::CompileError;

	fn build(asm: Asm, exception_table: &[ExceptionHandler]) -> Result<ControlFlow> {
		let code = asm.finish()?;
		let insns = duke::tree::method::code::Code {
			max_stack: 4,
			max_locals: 4,
			bytecode: code.clone(),
			exception_table: Vec::new(),
			line_numbers: Vec::new(),
		}.decode(&ConstantPool::default())?;
		ControlFlow::build(&insns, exception_table, code.len())
	}

	fn malformed(result: Result<ControlFlow>) -> CompileError {
		let error = result.expect_err("control flow should be malformed");
		error.downcast_ref::<CompileError>().cloned()
			.unwrap_or_else(|| panic!("expected a CompileError, got {error:?}"))
	}

	#[test]
	fn diamond() -> Result<()> {
		// if (a == 0) { b = 1 } else { b = 2 } return b
		let mut asm = Asm::new();
		let otherwise = asm.label();
		let end = asm.label();
		asm.op(insn::iload_0);
		asm.branch(insn::ifne, otherwise);
		asm.op(insn::iconst_1);
		asm.op(insn::istore_1);
		asm.branch(insn::goto, end);
		asm.bind(otherwise);
		asm.op(insn::iconst_2);
		asm.op(insn::istore_1);
		asm.bind(end);
		asm.op(insn::iload_1);
		asm.op(insn::ireturn);

		let cfg = build(asm, &[])?;
		let starts: Vec<_> = cfg.blocks.iter().map(|block| block.start).collect();
		assert_eq!(starts, vec![0, 4, 9, 11]);
		assert_eq!(cfg.successors, vec![vec![2, 1], vec![3], vec![3], vec![]]);

		assert!(cfg.is_reducible());
		assert!(cfg.is_merge(3));
		assert!(!cfg.is_merge(1));
		assert!((0..4).all(|block| !cfg.is_loop_header(block)));
		assert_eq!(cfg.immediate_dominator(3), Some(0));
		assert!(cfg.dominates(0, 3));
		assert!(!cfg.dominates(1, 3));
		Ok(())
	}

	#[test]
	fn loop_with_exit() -> Result<()> {
		// while (a != 0) { a-- } return
		let mut asm = Asm::new();
		let head = asm.label();
		let exit = asm.label();
		asm.bind(head);
		asm.op(insn::iload_0);
		asm.branch(insn::ifeq, exit);
		asm.iinc(0, -1);
		asm.branch(insn::goto, head);
		asm.bind(exit);
		asm.op(insn::r#return);

		let cfg = build(asm, &[])?;
		assert_eq!(cfg.blocks.len(), 3);
		assert!(cfg.is_reducible());
		assert!(cfg.is_loop_header(0));
		assert!(cfg.is_backward(1, 0));
		assert!(!cfg.is_merge(0));
		assert_eq!(cfg.reverse_postorder()[0], 0);
		Ok(())
	}

	#[test]
	fn two_entries_into_a_loop() -> Result<()> {
		let mut asm = Asm::new();
		let a = asm.label();
		let b = asm.label();
		asm.op(insn::iload_0);
		asm.branch(insn::ifeq, b);
		asm.bind(a);
		asm.iinc(0, 1);
		asm.branch(insn::goto, b);
		asm.bind(b);
		asm.op(insn::iload_0);
		asm.branch(insn::ifne, a);
		asm.op(insn::r#return);

		let cfg = build(asm, &[])?;
		assert!(!cfg.is_reducible());
		Ok(())
	}

	#[test]
	fn exception_edges() -> Result<()> {
		let mut asm = Asm::new();
		asm.op(insn::iload_0);
		asm.op(insn::iload_1);
		asm.op(insn::idiv);
		asm.op(insn::ireturn);
		asm.op(insn::astore_2);
		asm.op(insn::iconst_0);
		asm.op(insn::ireturn);

		let cfg = build(asm, &[
			ExceptionHandler { start: 0, end: 4, handler: 4, catch: Some(ClassName::from("java/lang/ArithmeticException")) },
		])?;
		assert_eq!(cfg.blocks.len(), 2);
		assert_eq!(cfg.handlers[0].len(), 1);
		assert_eq!(cfg.handlers[0][0].target, 1);
		assert!(cfg.handlers[1].is_empty());
		assert!(cfg.is_reachable(1));
		assert!(cfg.is_reducible());
		Ok(())
	}

	#[test]
	fn unreachable_code() -> Result<()> {
		let mut asm = Asm::new();
		asm.op(insn::r#return);
		asm.op(insn::r#return);

		let cfg = build(asm, &[])?;
		assert_eq!(cfg.blocks.len(), 2);
		assert!(!cfg.is_reachable(1));
		assert_eq!(cfg.reverse_postorder(), &[0]);
		Ok(())
	}

	#[test]
	fn branch_into_an_instruction() -> Result<()> {
		let mut asm = Asm::new();
		asm.sipush(1);
		asm.op(insn::pop);
		// goto -3, which is the operand of the sipush
		asm.bytes(&[insn::goto, 0xff, 0xfd]);

		assert_eq!(malformed(build(asm, &[])), CompileError::MalformedControlFlow {
			offset: 4,
			reason: "branch target 1 is not the start of an instruction".to_owned(),
		});
		Ok(())
	}

	#[test]
	fn falling_off_the_end() {
		let mut asm = Asm::new();
		asm.op(insn::iconst_0);
		asm.op(insn::pop);

		assert!(matches!(malformed(build(asm, &[])), CompileError::MalformedControlFlow { offset: 1, .. }));
	}

	#[test]
	fn handler_inside_an_instruction() {
		let mut asm = Asm::new();
		asm.sipush(1);
		asm.op(insn::ireturn);

		let handler = ExceptionHandler { start: 0, end: 3, handler: 2, catch: None };
		assert!(matches!(malformed(build(asm, &[handler])), CompileError::MalformedControlFlow { offset: 2, .. }));
	}
}
