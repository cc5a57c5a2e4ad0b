use anyhow::{anyhow, bail, Result};
use crate::insn;

/// A position in the bytecode, that may be bound later on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug)]
struct Fixup {
	/// Where the offset is written to.
	at: usize,
	/// The position of the opcode the offset is relative to.
	opcode_pos: usize,
	label: Label,
	wide: bool,
}

/// A small bytecode assembler, taking care of branch offsets and the padding of switches.
///
/// ```
/// use raw_class_file::{insn, Asm};
/// let mut asm = Asm::new();
/// let end = asm.label();
/// asm.op(insn::iload_0);
/// asm.branch(insn::ifeq, end);
/// asm.op(insn::nop);
/// asm.bind(end);
/// asm.op(insn::r#return);
/// assert_eq!(asm.finish().unwrap(), vec![insn::iload_0, insn::ifeq, 0, 4, insn::nop, insn::r#return]);
/// ```
#[derive(Debug, Default)]
pub struct Asm {
	code: Vec<u8>,
	labels: Vec<Option<usize>>,
	fixups: Vec<Fixup>,
}

impl Asm {
	pub fn new() -> Asm {
		Asm::default()
	}

	/// The offset the next instruction will be at.
	pub fn position(&self) -> u16 {
		self.code.len() as u16
	}

	pub fn label(&mut self) -> Label {
		self.labels.push(None);
		Label(self.labels.len() - 1)
	}

	/// Binds the label to the current position.
	pub fn bind(&mut self, label: Label) {
		self.labels[label.0] = Some(self.code.len());
	}

	/// The offset a bound label points to.
	pub fn offset(&self, label: Label) -> Result<u16> {
		self.labels[label.0]
			.map(|offset| offset as u16)
			.ok_or_else(|| anyhow!("label {label:?} isn't bound"))
	}

	pub fn op(&mut self, opcode: u8) {
		self.code.push(opcode);
	}

	pub fn op_u8(&mut self, opcode: u8, operand: u8) {
		self.code.push(opcode);
		self.code.push(operand);
	}

	pub fn op_u16(&mut self, opcode: u8, operand: u16) {
		self.code.push(opcode);
		self.code.extend(operand.to_be_bytes());
	}

	/// Appends raw bytes.
	pub fn bytes(&mut self, bytes: &[u8]) {
		self.code.extend(bytes);
	}

	pub fn bipush(&mut self, value: i8) {
		self.op_u8(insn::bipush, value as u8);
	}

	pub fn sipush(&mut self, value: i16) {
		self.op_u16(insn::sipush, value as u16);
	}

	pub fn iinc(&mut self, index: u8, delta: i8) {
		self.code.extend([insn::iinc, index, delta as u8]);
	}

	pub fn invokeinterface(&mut self, index: u16, count: u8) {
		self.op_u16(insn::invokeinterface, index);
		self.code.extend([count, 0]);
	}

	/// Any of the instructions with a two byte branch offset, like `ifeq` or `goto`.
	pub fn branch(&mut self, opcode: u8, label: Label) {
		let opcode_pos = self.code.len();
		self.code.push(opcode);
		self.fixups.push(Fixup { at: self.code.len(), opcode_pos, label, wide: false });
		self.code.extend([0, 0]);
	}

	/// Either `goto_w` or `jsr_w`.
	pub fn branch_wide(&mut self, opcode: u8, label: Label) {
		let opcode_pos = self.code.len();
		self.code.push(opcode);
		self.wide_offset(opcode_pos, label);
	}

	fn wide_offset(&mut self, opcode_pos: usize, label: Label) {
		self.fixups.push(Fixup { at: self.code.len(), opcode_pos, label, wide: true });
		self.code.extend([0, 0, 0, 0]);
	}

	fn pad(&mut self) {
		while self.code.len() % 4 != 0 {
			self.code.push(0);
		}
	}

	pub fn tableswitch(&mut self, default: Label, low: i32, targets: &[Label]) {
		let opcode_pos = self.code.len();
		self.code.push(insn::tableswitch);
		self.pad();
		self.wide_offset(opcode_pos, default);
		let high = low + targets.len() as i32 - 1;
		self.code.extend(low.to_be_bytes());
		self.code.extend(high.to_be_bytes());
		for &target in targets {
			self.wide_offset(opcode_pos, target);
		}
	}

	pub fn lookupswitch(&mut self, default: Label, pairs: &[(i32, Label)]) {
		let opcode_pos = self.code.len();
		self.code.push(insn::lookupswitch);
		self.pad();
		self.wide_offset(opcode_pos, default);
		self.code.extend((pairs.len() as i32).to_be_bytes());
		for &(key, target) in pairs {
			self.code.extend(key.to_be_bytes());
			self.wide_offset(opcode_pos, target);
		}
	}

	/// Fills in all branch offsets, failing if a label isn't bound or too far away.
	pub fn finish(mut self) -> Result<Vec<u8>> {
		for fixup in &self.fixups {
			let Some(target) = self.labels[fixup.label.0] else {
				bail!("label {:?} is used but never bound", fixup.label);
			};
			let offset = target as i64 - fixup.opcode_pos as i64;
			if fixup.wide {
				self.code[fixup.at..fixup.at + 4].copy_from_slice(&(offset as i32).to_be_bytes());
			} else {
				let offset = i16::try_from(offset)
					.map_err(|_| anyhow!("branch at {} to {target} doesn't fit into an i16", fixup.opcode_pos))?;
				self.code[fixup.at..fixup.at + 2].copy_from_slice(&offset.to_be_bytes());
			}
		}
		Ok(self.code)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::{insn, Asm};

	#[test]
	fn backward_branch() -> Result<()> {
		let mut asm = Asm::new();
		let top = asm.label();
		asm.bind(top);
		asm.op(insn::nop);
		asm.branch(insn::goto, top);
		assert_eq!(asm.finish()?, vec![insn::nop, insn::goto, 0xff, 0xff]);
		Ok(())
	}

	#[test]
	fn tableswitch_padding() -> Result<()> {
		let mut asm = Asm::new();
		let target = asm.label();
		asm.op(insn::iload_0);
		asm.tableswitch(target, 0, &[target]);
		asm.bind(target);
		asm.op(insn::r#return);
		assert_eq!(asm.finish()?, vec![
			insn::iload_0,
			insn::tableswitch, 0, 0,
			0, 0, 0, 19,
			0, 0, 0, 0,
			0, 0, 0, 0,
			0, 0, 0, 19,
			insn::r#return,
		]);
		Ok(())
	}

	#[test]
	fn unbound_label() {
		let mut asm = Asm::new();
		let label = asm.label();
		asm.branch(insn::goto, label);
		assert!(asm.finish().is_err());
	}
}
