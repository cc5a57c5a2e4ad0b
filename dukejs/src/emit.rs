use anyhow::{anyhow, Context, Result};
use log::trace;
use duke::tree::class::ClassFile;
use duke::tree::descriptor::Type;
use duke::tree::field::ConstantValue;
use duke::tree::method::Method;
use crate::error::CompileError;
use crate::hierarchy::Hierarchy;
use crate::js::{self, Js};
use crate::mangle;
use crate::natives::{self, NativeBodies};
use crate::runtime::Features;
use crate::translate::{class_literal, translate_method, Kind};

/// Writes the constructor function, the registration, the static fields and the methods of a class.
pub(crate) fn emit_class(js: &mut Js, class: &ClassFile, hierarchy: &Hierarchy, natives: &NativeBodies, features: &mut Features) -> Result<()> {
	let ctor = mangle::class_name(class.name.as_str());
	let is_interface = class.access.is_interface;
	let super_ctor = match &class.super_class {
		Some(super_class) if !is_interface => Some(mangle::class_name(super_class.as_str())),
		_ => None,
	};

	js.line(format!("// {}", class.name));
	js.open(format!("function {ctor}() {{"));
	if let Some(super_ctor) = &super_ctor {
		js.line(format!("{super_ctor}.call(this);"));
	}
	for field in class.fields.iter().filter(|field| !field.access.is_static) {
		let kind = Kind::of(&Type::parse(&field.descriptor)?);
		js.line(format!("this.{} = {};", hierarchy.instance_field_name(&class.name, &field.name), kind.default_value()));
	}
	js.close("}");

	let interfaces: Vec<String> = class.interfaces.iter()
		.map(|interface| mangle::class_name(interface.as_str()))
		.collect();
	js.line(format!("$vm.defineClass({ctor}, {}, {}, [{}], {is_interface});",
		class_literal(class.name.as_str()),
		super_ctor.as_deref().unwrap_or("null"),
		interfaces.join(", "),
	));

	for field in class.fields.iter().filter(|field| field.access.is_static) {
		let value = match &field.constant_value {
			Some(ConstantValue::Integer(v)) => v.to_string(),
			Some(ConstantValue::Float(v)) => js::float_literal(*v),
			Some(ConstantValue::Long(v)) => js::long_literal(*v),
			Some(ConstantValue::Double(v)) => js::double_literal(*v),
			Some(ConstantValue::String(v)) => js::string_literal(v),
			None => Kind::of(&Type::parse(&field.descriptor)?).default_value().to_owned(),
		};
		js.line(format!("{ctor}.{} = {value};", mangle::field_name(&field.name)));
	}

	for method in &class.methods {
		emit_method(js, class, method, hierarchy, natives, features)
			.with_context(|| anyhow!("failed to translate method {}{} of class {}", method.name, method.descriptor, class.name))?;
	}

	Ok(())
}

fn emit_method(js: &mut Js, class: &ClassFile, method: &Method, hierarchy: &Hierarchy, natives: &NativeBodies, features: &mut Features) -> Result<()> {
	if let Some(native) = natives::find(natives, class.name.as_str(), method)? {
		trace!("using the javascript body of {}.{}{}", class.name, method.name, method.descriptor);
		let args = native.args.join(", ");
		if method.access.is_static {
			js.line(format!("function {}({args}) {{", mangle::static_method(class.name.as_str(), &method.name, &method.descriptor)?));
			js.raw(&native.body);
			js.line("}");
		} else {
			js.line(format!("{}.prototype.{} = function({args}) {{",
				mangle::class_name(class.name.as_str()),
				mangle::method_name(&method.name, &method.descriptor)?,
			));
			js.raw(&native.body);
			js.line("};");
		}
		return Ok(());
	}

	if method.access.is_native {
		return Err(CompileError::MissingNativeBody {
			class: class.name.to_string(),
			method: method.name.clone(),
			descriptor: method.descriptor.clone(),
		}.into());
	}
	if method.code.is_none() {
		// abstract, the implementations are found through the prototype chain
		return Ok(());
	}

	let function = translate_method(class, method, hierarchy, features)?;
	js.raw(&function);
	Ok(())
}
