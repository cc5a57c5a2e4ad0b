use std::io::Cursor;
use anyhow::{anyhow, Context, Result};
use crate::{ClassRead, DecodeError};
use crate::class_constants::{array_type, opcode};
use crate::class_reader::pool::ConstantPool;
use crate::tree::method::code::{ArrayType, Insn, Instruction, LvIndex};

trait CodeReadHelper: ClassRead {
	fn read_u8_as_local_variable(&mut self) -> Result<LvIndex> {
		Ok(LvIndex { index: self.read_u8()? as u16 })
	}
	fn read_u16_as_local_variable(&mut self) -> Result<LvIndex> {
		Ok(LvIndex { index: self.read_u16()? })
	}
}

impl<T: ClassRead> CodeReadHelper for T {}

/// Turns a relative branch offset into an absolute one, checking that it lands inside the code.
fn branch_target(opcode_pos: u16, branch: i64, code_length: usize) -> Result<u16> {
	let target = opcode_pos as i64 + branch;
	if target < 0 || target >= code_length as i64 {
		return Err(DecodeError::BranchOutOfRange { offset: opcode_pos, target }.into());
	}
	Ok(target as u16)
}

fn align_to_4_byte_boundary(reader: &mut impl ClassRead) -> Result<()> {
	let padding = (4 - (reader.marker()? & 0b11)) & 0b11;
	reader.skip(padding)
}

fn array_type_from_atype(atype: u8) -> Result<ArrayType> {
	Ok(match atype {
		array_type::T_BOOLEAN => ArrayType::Boolean,
		array_type::T_CHAR => ArrayType::Char,
		array_type::T_FLOAT => ArrayType::Float,
		array_type::T_DOUBLE => ArrayType::Double,
		array_type::T_BYTE => ArrayType::Byte,
		array_type::T_SHORT => ArrayType::Short,
		array_type::T_INT => ArrayType::Int,
		array_type::T_LONG => ArrayType::Long,
		atype => anyhow::bail!("unknown `atype` {atype} for `newarray`"),
	})
}

/// Decodes all the instructions of the given bytecode.
///
/// The offsets of the instructions are the offsets in `bytecode`, and since a `Code` attribute can't hold more than
/// 65535 bytes, they fit into an `u16`.
pub(crate) fn decode(bytecode: &[u8], pool: &ConstantPool) -> Result<Vec<Insn>> {
	let code_length = bytecode.len();
	let mut r = Cursor::new(bytecode);
	let mut insns = Vec::new();

	while (r.position() as usize) < code_length {
		let opcode_pos = r.position() as u16;
		let op = r.read_u8()?;

		let instruction = decode_instruction(&mut r, op, opcode_pos, code_length, pool)
			.with_context(|| anyhow!("at bytecode offset {opcode_pos}"))?;

		insns.push(Insn { offset: opcode_pos, opcode: op, instruction });
	}

	Ok(insns)
}

fn decode_instruction(
	r: &mut Cursor<&[u8]>,
	op: u8,
	opcode_pos: u16,
	code_length: usize,
	pool: &ConstantPool,
) -> Result<Instruction> {
	let branch16 = |r: &mut Cursor<&[u8]>| -> Result<u16> {
		branch_target(opcode_pos, r.read_i16()? as i64, code_length)
	};
	let branch32 = |r: &mut Cursor<&[u8]>| -> Result<u16> {
		branch_target(opcode_pos, r.read_i32()? as i64, code_length)
	};

	Ok(match op {
		opcode::NOP         => Instruction::Nop,
		opcode::ACONST_NULL => Instruction::AConstNull,
		opcode::ICONST_M1   => Instruction::IConstM1,
		opcode::ICONST_0    => Instruction::IConst0,
		opcode::ICONST_1    => Instruction::IConst1,
		opcode::ICONST_2    => Instruction::IConst2,
		opcode::ICONST_3    => Instruction::IConst3,
		opcode::ICONST_4    => Instruction::IConst4,
		opcode::ICONST_5    => Instruction::IConst5,
		opcode::LCONST_0    => Instruction::LConst0,
		opcode::LCONST_1    => Instruction::LConst1,
		opcode::FCONST_0    => Instruction::FConst0,
		opcode::FCONST_1    => Instruction::FConst1,
		opcode::FCONST_2    => Instruction::FConst2,
		opcode::DCONST_0    => Instruction::DConst0,
		opcode::DCONST_1    => Instruction::DConst1,
		opcode::BIPUSH      => Instruction::BiPush(r.read_i8()?),
		opcode::SIPUSH      => Instruction::SiPush(r.read_i16()?),
		opcode::LDC         => Instruction::Ldc(pool.loadable_at(r.read_u8()? as u16)?),
		opcode::LDC_W | opcode::LDC2_W => Instruction::Ldc(pool.loadable_at(r.read_u16()?)?),
		opcode::ILOAD => Instruction::ILoad(r.read_u8_as_local_variable()?),
		opcode::LLOAD => Instruction::LLoad(r.read_u8_as_local_variable()?),
		opcode::FLOAD => Instruction::FLoad(r.read_u8_as_local_variable()?),
		opcode::DLOAD => Instruction::DLoad(r.read_u8_as_local_variable()?),
		opcode::ALOAD => Instruction::ALoad(r.read_u8_as_local_variable()?),
		opcode::ILOAD_0..=opcode::ALOAD_3 => {
			// `iload_0` to `aload_3` are grouped by the kind first, four indices each
			let n = op - opcode::ILOAD_0;
			let index = LvIndex { index: (n % 4) as u16 };
			match n / 4 {
				0 => Instruction::ILoad(index),
				1 => Instruction::LLoad(index),
				2 => Instruction::FLoad(index),
				3 => Instruction::DLoad(index),
				_ => Instruction::ALoad(index),
			}
		},
		opcode::IALOAD => Instruction::IALoad,
		opcode::LALOAD => Instruction::LALoad,
		opcode::FALOAD => Instruction::FALoad,
		opcode::DALOAD => Instruction::DALoad,
		opcode::AALOAD => Instruction::AALoad,
		opcode::BALOAD => Instruction::BALoad,
		opcode::CALOAD => Instruction::CALoad,
		opcode::SALOAD => Instruction::SALoad,
		opcode::ISTORE => Instruction::IStore(r.read_u8_as_local_variable()?),
		opcode::LSTORE => Instruction::LStore(r.read_u8_as_local_variable()?),
		opcode::FSTORE => Instruction::FStore(r.read_u8_as_local_variable()?),
		opcode::DSTORE => Instruction::DStore(r.read_u8_as_local_variable()?),
		opcode::ASTORE => Instruction::AStore(r.read_u8_as_local_variable()?),
		opcode::ISTORE_0..=opcode::ASTORE_3 => {
			let n = op - opcode::ISTORE_0;
			let index = LvIndex { index: (n % 4) as u16 };
			match n / 4 {
				0 => Instruction::IStore(index),
				1 => Instruction::LStore(index),
				2 => Instruction::FStore(index),
				3 => Instruction::DStore(index),
				_ => Instruction::AStore(index),
			}
		},
		opcode::IASTORE => Instruction::IAStore,
		opcode::LASTORE => Instruction::LAStore,
		opcode::FASTORE => Instruction::FAStore,
		opcode::DASTORE => Instruction::DAStore,
		opcode::AASTORE => Instruction::AAStore,
		opcode::BASTORE => Instruction::BAStore,
		opcode::CASTORE => Instruction::CAStore,
		opcode::SASTORE => Instruction::SAStore,
		opcode::POP     => Instruction::Pop,
		opcode::POP2    => Instruction::Pop2,
		opcode::DUP     => Instruction::Dup,
		opcode::DUP_X1  => Instruction::DupX1,
		opcode::DUP_X2  => Instruction::DupX2,
		opcode::DUP2    => Instruction::Dup2,
		opcode::DUP2_X1 => Instruction::Dup2X1,
		opcode::DUP2_X2 => Instruction::Dup2X2,
		opcode::SWAP    => Instruction::Swap,
		opcode::IADD => Instruction::IAdd,
		opcode::LADD => Instruction::LAdd,
		opcode::FADD => Instruction::FAdd,
		opcode::DADD => Instruction::DAdd,
		opcode::ISUB => Instruction::ISub,
		opcode::LSUB => Instruction::LSub,
		opcode::FSUB => Instruction::FSub,
		opcode::DSUB => Instruction::DSub,
		opcode::IMUL => Instruction::IMul,
		opcode::LMUL => Instruction::LMul,
		opcode::FMUL => Instruction::FMul,
		opcode::DMUL => Instruction::DMul,
		opcode::IDIV => Instruction::IDiv,
		opcode::LDIV => Instruction::LDiv,
		opcode::FDIV => Instruction::FDiv,
		opcode::DDIV => Instruction::DDiv,
		opcode::IREM => Instruction::IRem,
		opcode::LREM => Instruction::LRem,
		opcode::FREM => Instruction::FRem,
		opcode::DREM => Instruction::DRem,
		opcode::INEG => Instruction::INeg,
		opcode::LNEG => Instruction::LNeg,
		opcode::FNEG => Instruction::FNeg,
		opcode::DNEG => Instruction::DNeg,
		opcode::ISHL  => Instruction::IShl,
		opcode::LSHL  => Instruction::LShl,
		opcode::ISHR  => Instruction::IShr,
		opcode::LSHR  => Instruction::LShr,
		opcode::IUSHR => Instruction::IUShr,
		opcode::LUSHR => Instruction::LUShr,
		opcode::IAND  => Instruction::IAnd,
		opcode::LAND  => Instruction::LAnd,
		opcode::IOR   => Instruction::IOr,
		opcode::LOR   => Instruction::LOr,
		opcode::IXOR  => Instruction::IXor,
		opcode::LXOR  => Instruction::LXor,
		opcode::IINC => Instruction::IInc(r.read_u8_as_local_variable()?, r.read_i8()? as i16),
		opcode::I2L => Instruction::I2L,
		opcode::I2F => Instruction::I2F,
		opcode::I2D => Instruction::I2D,
		opcode::L2I => Instruction::L2I,
		opcode::L2F => Instruction::L2F,
		opcode::L2D => Instruction::L2D,
		opcode::F2I => Instruction::F2I,
		opcode::F2L => Instruction::F2L,
		opcode::F2D => Instruction::F2D,
		opcode::D2I => Instruction::D2I,
		opcode::D2L => Instruction::D2L,
		opcode::D2F => Instruction::D2F,
		opcode::I2B => Instruction::I2B,
		opcode::I2C => Instruction::I2C,
		opcode::I2S => Instruction::I2S,
		opcode::LCMP  => Instruction::LCmp,
		opcode::FCMPL => Instruction::FCmpL,
		opcode::FCMPG => Instruction::FCmpG,
		opcode::DCMPL => Instruction::DCmpL,
		opcode::DCMPG => Instruction::DCmpG,
		opcode::IFEQ => Instruction::IfEq(branch16(r)?),
		opcode::IFNE => Instruction::IfNe(branch16(r)?),
		opcode::IFLT => Instruction::IfLt(branch16(r)?),
		opcode::IFGE => Instruction::IfGe(branch16(r)?),
		opcode::IFGT => Instruction::IfGt(branch16(r)?),
		opcode::IFLE => Instruction::IfLe(branch16(r)?),
		opcode::IF_ICMPEQ => Instruction::IfICmpEq(branch16(r)?),
		opcode::IF_ICMPNE => Instruction::IfICmpNe(branch16(r)?),
		opcode::IF_ICMPLT => Instruction::IfICmpLt(branch16(r)?),
		opcode::IF_ICMPGE => Instruction::IfICmpGe(branch16(r)?),
		opcode::IF_ICMPGT => Instruction::IfICmpGt(branch16(r)?),
		opcode::IF_ICMPLE => Instruction::IfICmpLe(branch16(r)?),
		opcode::IF_ACMPEQ => Instruction::IfACmpEq(branch16(r)?),
		opcode::IF_ACMPNE => Instruction::IfACmpNe(branch16(r)?),
		opcode::GOTO => Instruction::Goto(branch16(r)?),
		opcode::JSR  => Instruction::Jsr(branch16(r)?),
		opcode::RET  => Instruction::Ret(r.read_u8_as_local_variable()?),
		opcode::TABLESWITCH => {
			align_to_4_byte_boundary(r)?;

			let default = branch32(r)?;
			let low = r.read_i32()?;
			let high = r.read_i32()?;

			if low > high {
				anyhow::bail!("in tableswitch `low` must be lower or equal to `high`, it's low={low:?} and high={high:?}");
			}

			let n = (high as i64 - low as i64 + 1) as usize;
			let mut table = Vec::with_capacity(n.min(code_length));
			for _ in 0..n {
				table.push(branch32(r)?);
			}

			Instruction::TableSwitch { default, low, high, table }
		},
		opcode::LOOKUPSWITCH => {
			align_to_4_byte_boundary(r)?;

			let default = branch32(r)?;

			let n = r.read_i32()?;
			if n < 0 {
				anyhow::bail!("in lookupswitch the `npairs` must be positive, it's npairs={n:?}");
			}

			let mut pairs = Vec::with_capacity((n as usize).min(code_length));
			for _ in 0..n {
				let key = r.read_i32()?;
				pairs.push((key, branch32(r)?));
			}

			Instruction::LookupSwitch { default, pairs }
		},
		opcode::IRETURN => Instruction::IReturn,
		opcode::LRETURN => Instruction::LReturn,
		opcode::FRETURN => Instruction::FReturn,
		opcode::DRETURN => Instruction::DReturn,
		opcode::ARETURN => Instruction::AReturn,
		opcode::RETURN  => Instruction::Return,
		opcode::GETSTATIC => Instruction::GetStatic(pool.field_ref_at(r.read_u16()?)?),
		opcode::PUTSTATIC => Instruction::PutStatic(pool.field_ref_at(r.read_u16()?)?),
		opcode::GETFIELD  => Instruction::GetField(pool.field_ref_at(r.read_u16()?)?),
		opcode::PUTFIELD  => Instruction::PutField(pool.field_ref_at(r.read_u16()?)?),
		opcode::INVOKEVIRTUAL => {
			let (method_ref, _) = pool.method_ref_at(r.read_u16()?)?;
			Instruction::InvokeVirtual(method_ref)
		},
		opcode::INVOKESPECIAL => {
			let (method_ref, is_interface) = pool.method_ref_at(r.read_u16()?)?;
			Instruction::InvokeSpecial(method_ref, is_interface)
		},
		opcode::INVOKESTATIC => {
			let (method_ref, is_interface) = pool.method_ref_at(r.read_u16()?)?;
			Instruction::InvokeStatic(method_ref, is_interface)
		},
		opcode::INVOKEINTERFACE => {
			let method_ref = pool.interface_method_ref_at(r.read_u16()?)?;
			let _count = r.read_u8()?;
			let _zero = r.read_u8()?;
			Instruction::InvokeInterface(method_ref)
		},
		opcode::INVOKEDYNAMIC => {
			let index = r.read_u16()?;
			pool.get(index)?;
			let _zero = r.read_u8()?;
			let _zero = r.read_u8()?;
			Instruction::InvokeDynamic(index)
		},
		opcode::NEW          => Instruction::New(pool.class_name_at(r.read_u16()?)?),
		opcode::NEWARRAY     => Instruction::NewArray(array_type_from_atype(r.read_u8()?)?),
		opcode::ANEWARRAY    => Instruction::ANewArray(pool.class_name_at(r.read_u16()?)?),
		opcode::ARRAYLENGTH  => Instruction::ArrayLength,
		opcode::ATHROW       => Instruction::AThrow,
		opcode::CHECKCAST    => Instruction::CheckCast(pool.class_name_at(r.read_u16()?)?),
		opcode::INSTANCEOF   => Instruction::InstanceOf(pool.class_name_at(r.read_u16()?)?),
		opcode::MONITORENTER => Instruction::MonitorEnter,
		opcode::MONITOREXIT  => Instruction::MonitorExit,
		opcode::WIDE => {
			match r.read_u8()? {
				opcode::ILOAD  => Instruction::ILoad(r.read_u16_as_local_variable()?),
				opcode::LLOAD  => Instruction::LLoad(r.read_u16_as_local_variable()?),
				opcode::FLOAD  => Instruction::FLoad(r.read_u16_as_local_variable()?),
				opcode::DLOAD  => Instruction::DLoad(r.read_u16_as_local_variable()?),
				opcode::ALOAD  => Instruction::ALoad(r.read_u16_as_local_variable()?),
				opcode::ISTORE => Instruction::IStore(r.read_u16_as_local_variable()?),
				opcode::LSTORE => Instruction::LStore(r.read_u16_as_local_variable()?),
				opcode::FSTORE => Instruction::FStore(r.read_u16_as_local_variable()?),
				opcode::DSTORE => Instruction::DStore(r.read_u16_as_local_variable()?),
				opcode::ASTORE => Instruction::AStore(r.read_u16_as_local_variable()?),
				opcode::RET    => Instruction::Ret(r.read_u16_as_local_variable()?),
				opcode::IINC   => Instruction::IInc(r.read_u16_as_local_variable()?, r.read_i16()?),
				wide_opcode => return Err(DecodeError::UnknownOpcode { opcode: wide_opcode, offset: opcode_pos + 1 }.into()),
			}
		},
		opcode::MULTIANEWARRAY => Instruction::MultiANewArray(pool.class_name_at(r.read_u16()?)?, r.read_u8()?),
		opcode::IFNULL    => Instruction::IfNull(branch16(r)?),
		opcode::IFNONNULL => Instruction::IfNonNull(branch16(r)?),
		opcode::GOTO_W => Instruction::Goto(branch32(r)?),
		opcode::JSR_W  => Instruction::Jsr(branch32(r)?),
		opcode => return Err(DecodeError::UnknownOpcode { opcode, offset: opcode_pos }.into()),
	})
}
