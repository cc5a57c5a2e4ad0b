use std::fmt::{Debug, Formatter};
use anyhow::Result;
use java_string::JavaString;
use crate::class_reader::pool::ConstantPool;
use crate::tree::class::ClassName;
use crate::tree::field::FieldRef;
use crate::tree::method::MethodRef;

/// The `Code` attribute of a method.
///
/// The bytecode is kept as is, use [`Code::decode`] to get at the instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
	pub max_stack: u16,
	pub max_locals: u16,
	pub bytecode: Vec<u8>,
	/// The handlers, in the order they're tried.
	pub exception_table: Vec<ExceptionHandler>,
	pub line_numbers: Vec<LineNumber>,
}

impl Code {
	/// Decodes all instructions of the bytecode, resolving the constant pool operands against the given pool.
	pub fn decode(&self, pool: &ConstantPool) -> Result<Vec<Insn>> {
		crate::class_reader::code::decode(&self.bytecode, pool)
	}
}

/// An entry of the exception table.
///
/// The range `start..end` is half-open. The reader guarantees `start <= end <= code length` and
/// `handler < code length`. Whether these offsets are starts of instructions isn't checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
	pub start: u16,
	pub end: u16,
	pub handler: u16,
	/// [`None`] catches everything, this is used for `finally`.
	pub catch: Option<ClassName>,
}

impl ExceptionHandler {
	pub fn covers(&self, offset: u16) -> bool {
		self.start <= offset && offset < self.end
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
	pub start: u16,
	pub line: u16,
}

/// The index of a local variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LvIndex {
	pub index: u16,
}

impl Debug for LvIndex {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "LvIndex({})", self.index)
	}
}

/// An instruction together with where it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Insn {
	/// The offset of the opcode in the bytecode.
	pub offset: u16,
	/// The opcode byte, for `wide` instructions that's the `wide` opcode.
	pub opcode: u8,
	pub instruction: Instruction,
}

/// An instruction.
///
/// Branch targets are absolute offsets into the bytecode. Instructions that have a short and a long form (like
/// `iload_0` and `iload`, or `ldc` and `ldc_w`) are represented by one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
	Nop,
	AConstNull,
	IConstM1, IConst0, IConst1, IConst2, IConst3, IConst4, IConst5,
	LConst0, LConst1,
	FConst0, FConst1, FConst2,
	DConst0, DConst1,
	BiPush(i8),
	SiPush(i16),
	Ldc(Loadable),
	ILoad(LvIndex), LLoad(LvIndex), FLoad(LvIndex), DLoad(LvIndex), ALoad(LvIndex),
	IALoad, LALoad, FALoad, DALoad, AALoad, BALoad, CALoad, SALoad,
	IStore(LvIndex), LStore(LvIndex), FStore(LvIndex), DStore(LvIndex), AStore(LvIndex),
	IAStore, LAStore, FAStore, DAStore, AAStore, BAStore, CAStore, SAStore,
	Pop, Pop2,
	Dup, DupX1, DupX2,
	Dup2, Dup2X1, Dup2X2,
	Swap,
	IAdd, LAdd, FAdd, DAdd,
	ISub, LSub, FSub, DSub,
	IMul, LMul, FMul, DMul,
	IDiv, LDiv, FDiv, DDiv,
	IRem, LRem, FRem, DRem,
	INeg, LNeg, FNeg, DNeg,
	IShl, LShl,
	IShr, LShr,
	IUShr, LUShr,
	IAnd, LAnd,
	IOr, LOr,
	IXor, LXor,
	IInc(LvIndex, i16),
	I2L, I2F, I2D,
	L2I, L2F, L2D,
	F2I, F2L, F2D,
	D2I, D2L, D2F,
	I2B, I2C, I2S,
	LCmp,
	FCmpL, FCmpG,
	DCmpL, DCmpG,
	IfEq(u16), IfNe(u16), IfLt(u16), IfGe(u16), IfGt(u16), IfLe(u16),
	IfICmpEq(u16), IfICmpNe(u16), IfICmpLt(u16), IfICmpGe(u16), IfICmpGt(u16), IfICmpLe(u16),
	IfACmpEq(u16), IfACmpNe(u16),
	Goto(u16),
	Jsr(u16),
	Ret(LvIndex),
	TableSwitch {
		default: u16,
		low: i32,
		high: i32,
		table: Vec<u16>,
	},
	LookupSwitch {
		default: u16,
		pairs: Vec<(i32, u16)>,
	},
	IReturn, LReturn, FReturn, DReturn, AReturn,
	Return,
	GetStatic(FieldRef),
	PutStatic(FieldRef),
	GetField(FieldRef),
	PutField(FieldRef),
	InvokeVirtual(MethodRef),
	/// The `bool` indicates if the method is in an interface.
	InvokeSpecial(MethodRef, bool),
	/// The `bool` indicates if the method is in an interface.
	InvokeStatic(MethodRef, bool),
	InvokeInterface(MethodRef),
	/// Carries the pool index of the `InvokeDynamic` entry, bootstrap methods are not resolved.
	InvokeDynamic(u16),
	New(ClassName),
	NewArray(ArrayType),
	ANewArray(ClassName),
	ArrayLength,
	AThrow,
	CheckCast(ClassName),
	InstanceOf(ClassName),
	MonitorEnter, MonitorExit,
	MultiANewArray(ClassName, u8),
	IfNull(u16), IfNonNull(u16),
}

impl Instruction {
	/// The offsets this instruction may jump to, not including the next instruction.
	pub fn branch_targets(&self) -> Vec<u16> {
		use Instruction::*;
		match self {
			IfEq(x) | IfNe(x) | IfLt(x) | IfGe(x) | IfGt(x) | IfLe(x) |
			IfICmpEq(x) | IfICmpNe(x) | IfICmpLt(x) | IfICmpGe(x) | IfICmpGt(x) | IfICmpLe(x) |
			IfACmpEq(x) | IfACmpNe(x) | IfNull(x) | IfNonNull(x) |
			Goto(x) | Jsr(x) => vec![*x],
			TableSwitch { default, table, .. } => {
				let mut targets = vec![*default];
				targets.extend(table);
				targets
			},
			LookupSwitch { default, pairs } => {
				let mut targets = vec![*default];
				targets.extend(pairs.iter().map(|(_, target)| *target));
				targets
			},
			_ => Vec::new(),
		}
	}

	/// Whether execution can continue with the next instruction.
	pub fn falls_through(&self) -> bool {
		use Instruction::*;
		!matches!(self,
			Goto(_) | Jsr(_) | Ret(_) |
			TableSwitch { .. } | LookupSwitch { .. } |
			IReturn | LReturn | FReturn | DReturn | AReturn | Return |
			AThrow
		)
	}
}

/// A constant that can be loaded with the `ldc` family of instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	String(JavaString),
	Class(ClassName),
	/// These carry the pool index, they're not resolved any further.
	MethodHandle(u16),
	MethodType(u16),
	Dynamic(u16),
}

/// The element type of a primitive array, as created by `newarray`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayType {
	Boolean,
	Char,
	Float,
	Double,
	Byte,
	Short,
	Int,
	Long,
}

impl ArrayType {
	/// The descriptor of the element type, like `Z` for [`ArrayType::Boolean`].
	pub fn descriptor(self) -> char {
		match self {
			ArrayType::Boolean => 'Z',
			ArrayType::Char => 'C',
			ArrayType::Float => 'F',
			ArrayType::Double => 'D',
			ArrayType::Byte => 'B',
			ArrayType::Short => 'S',
			ArrayType::Int => 'I',
			ArrayType::Long => 'J',
		}
	}
}
