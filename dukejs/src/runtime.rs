//! The javascript the translated classes need at run time.
//!
//! The runtime is split into [`Feature`]s. While translating, each use of a runtime function records the feature it's
//! in, and in the end only the used features are written, each once, in the order of [`Feature`].

use std::collections::BTreeSet;
use std::fmt::Write;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::method::Method;
use crate::mangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
	/// `$vm.defineClass`, `$vm.link`, `java/lang/Object`, the glue for `java/lang/String` and the basic interfaces.
	ClassModel,
	/// `java/lang/Throwable` and the exceptions the other features throw.
	Exceptions,
	NullChecks,
	/// Integer and long division, which may throw.
	Arithmetic,
	/// Floating point to integer conversions.
	Conversions,
	Compares,
	Longs,
	TypeChecks,
	Arrays,
	ClassLiterals,
}

impl Feature {
	pub const ALL: [Feature; 10] = [
		Feature::ClassModel,
		Feature::Exceptions,
		Feature::NullChecks,
		Feature::Arithmetic,
		Feature::Conversions,
		Feature::Compares,
		Feature::Longs,
		Feature::TypeChecks,
		Feature::Arrays,
		Feature::ClassLiterals,
	];

	/// The features this one calls into.
	pub fn dependencies(self) -> &'static [Feature] {
		match self {
			Feature::ClassModel => &[],
			Feature::Exceptions => &[Feature::ClassModel],
			Feature::NullChecks => &[Feature::Exceptions],
			Feature::Arithmetic => &[Feature::Exceptions],
			Feature::Conversions => &[],
			Feature::Compares => &[],
			Feature::Longs => &[],
			Feature::TypeChecks => &[Feature::ClassModel, Feature::Exceptions],
			Feature::Arrays => &[Feature::NullChecks, Feature::TypeChecks],
			Feature::ClassLiterals => &[Feature::ClassModel],
		}
	}

	fn name(self) -> &'static str {
		match self {
			Feature::ClassModel => "class model",
			Feature::Exceptions => "exceptions",
			Feature::NullChecks => "null checks",
			Feature::Arithmetic => "arithmetic",
			Feature::Conversions => "conversions",
			Feature::Compares => "compares",
			Feature::Longs => "longs",
			Feature::TypeChecks => "type checks",
			Feature::Arrays => "arrays",
			Feature::ClassLiterals => "class literals",
		}
	}

	fn source(self) -> &'static str {
		match self {
			Feature::ClassModel => CLASS_MODEL,
			Feature::Exceptions => EXCEPTIONS,
			Feature::NullChecks => NULL_CHECKS,
			Feature::Arithmetic => ARITHMETIC,
			Feature::Conversions => CONVERSIONS,
			Feature::Compares => COMPARES,
			Feature::Longs => LONGS,
			Feature::TypeChecks => TYPE_CHECKS,
			Feature::Arrays => ARRAYS,
			Feature::ClassLiterals => CLASS_LITERALS,
		}
	}
}

/// A set of [`Feature`]s, always closed under [`Feature::dependencies`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features(BTreeSet<Feature>);

impl Features {
	pub fn new() -> Features {
		Features::default()
	}

	pub fn insert(&mut self, feature: Feature) {
		if self.0.insert(feature) {
			for &dependency in feature.dependencies() {
				self.insert(dependency);
			}
		}
	}

	pub fn contains(&self, feature: Feature) -> bool {
		self.0.contains(&feature)
	}

	/// The features, in the order they're emitted in.
	pub fn iter(&self) -> impl Iterator<Item=Feature> + '_ {
		self.0.iter().copied()
	}
}

enum BuiltinKind {
	Source(&'static str),
	Interface,
	Exception,
}

struct Builtin {
	name: &'static str,
	super_class: Option<&'static str>,
	feature: Feature,
	kind: BuiltinKind,
	/// The instance methods the class declares itself, as name and descriptor.
	methods: &'static [(&'static str, &'static str)],
	/// Whether a runtime function throws or creates instances of the class.
	used_by_runtime: bool,
}

impl Builtin {
	const fn interface(name: &'static str, methods: &'static [(&'static str, &'static str)]) -> Builtin {
		Builtin {
			name,
			super_class: Some("java/lang/Object"),
			feature: Feature::ClassModel,
			kind: BuiltinKind::Interface,
			methods,
			used_by_runtime: false,
		}
	}

	const fn exception(name: &'static str, super_class: &'static str, used_by_runtime: bool) -> Builtin {
		Builtin {
			name,
			super_class: Some(super_class),
			feature: Feature::Exceptions,
			kind: BuiltinKind::Exception,
			methods: THROWABLE_CONSTRUCTORS,
			used_by_runtime,
		}
	}

	fn write(&self, out: &mut String) {
		match self.kind {
			BuiltinKind::Source(source) => out.push_str(source),
			BuiltinKind::Interface => {
				let ctor = mangle::class_name(self.name);
				let _ = write!(out, "function {ctor}() {{\n}}\n$vm.defineClass({ctor}, \"{}\", null, [], true);\n", self.name);
			},
			BuiltinKind::Exception => {
				let ctor = mangle::class_name(self.name);
				let super_ctor = mangle::class_name(self.super_class.unwrap_or("java/lang/Throwable"));
				let _ = write!(out,
					"function {ctor}() {{\n\t{super_ctor}.call(this);\n}}\n$vm.defineClass({ctor}, \"{}\", {super_ctor}, [], false);\n",
					self.name
				);
			},
		}
	}
}

const OBJECT_METHODS: &[(&str, &str)] = &[
	("<init>", "()V"),
	("hashCode", "()I"),
	("equals", "(Ljava/lang/Object;)Z"),
	("toString", "()Ljava/lang/String;"),
	("getClass", "()Ljava/lang/Class;"),
];

const STRING_METHODS: &[(&str, &str)] = &[
	("length", "()I"),
	("charAt", "(I)C"),
	("isEmpty", "()Z"),
	("equals", "(Ljava/lang/Object;)Z"),
	("hashCode", "()I"),
	("concat", "(Ljava/lang/String;)Ljava/lang/String;"),
	("toString", "()Ljava/lang/String;"),
	("compareTo", "(Ljava/lang/String;)I"),
	("compareTo", "(Ljava/lang/Object;)I"),
	("getClass", "()Ljava/lang/Class;"),
];

const THROWABLE_CONSTRUCTORS: &[(&str, &str)] = &[
	("<init>", "()V"),
	("<init>", "(Ljava/lang/String;)V"),
	("<init>", "(Ljava/lang/String;Ljava/lang/Throwable;)V"),
	("<init>", "(Ljava/lang/Throwable;)V"),
];

const THROWABLE_METHODS: &[(&str, &str)] = &[
	("<init>", "()V"),
	("<init>", "(Ljava/lang/String;)V"),
	("<init>", "(Ljava/lang/String;Ljava/lang/Throwable;)V"),
	("<init>", "(Ljava/lang/Throwable;)V"),
	("getMessage", "()Ljava/lang/String;"),
	("getCause", "()Ljava/lang/Throwable;"),
	("toString", "()Ljava/lang/String;"),
];

const BUILTINS: &[Builtin] = &[
	Builtin {
		name: "java/lang/Object",
		super_class: None,
		feature: Feature::ClassModel,
		kind: BuiltinKind::Source(OBJECT),
		methods: OBJECT_METHODS,
		used_by_runtime: false,
	},
	Builtin {
		name: "java/lang/String",
		super_class: Some("java/lang/Object"),
		feature: Feature::ClassModel,
		kind: BuiltinKind::Source(STRING),
		methods: STRING_METHODS,
		used_by_runtime: false,
	},
	Builtin::interface("java/lang/Cloneable", &[]),
	Builtin::interface("java/io/Serializable", &[]),
	Builtin::interface("java/lang/Comparable", &[("compareTo", "(Ljava/lang/Object;)I")]),
	Builtin::interface("java/lang/CharSequence", &[("length", "()I"), ("charAt", "(I)C"), ("toString", "()Ljava/lang/String;")]),
	Builtin {
		name: "java/lang/Throwable",
		super_class: Some("java/lang/Object"),
		feature: Feature::Exceptions,
		kind: BuiltinKind::Source(THROWABLE),
		methods: THROWABLE_METHODS,
		used_by_runtime: true,
	},
	Builtin::exception("java/lang/Exception", "java/lang/Throwable", true),
	Builtin::exception("java/lang/Error", "java/lang/Throwable", true),
	Builtin::exception("java/lang/RuntimeException", "java/lang/Exception", true),
	Builtin::exception("java/lang/ArithmeticException", "java/lang/RuntimeException", true),
	Builtin::exception("java/lang/NullPointerException", "java/lang/RuntimeException", true),
	Builtin::exception("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException", true),
	Builtin::exception("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException", true),
	Builtin::exception("java/lang/NegativeArraySizeException", "java/lang/RuntimeException", true),
	Builtin::exception("java/lang/ClassCastException", "java/lang/RuntimeException", true),
	Builtin::exception("java/lang/ArrayStoreException", "java/lang/RuntimeException", true),
	Builtin::exception("java/lang/IllegalArgumentException", "java/lang/RuntimeException", false),
	Builtin::exception("java/lang/IllegalStateException", "java/lang/RuntimeException", false),
	Builtin::exception("java/lang/UnsupportedOperationException", "java/lang/RuntimeException", false),
	Builtin {
		name: "java/lang/Class",
		super_class: Some("java/lang/Object"),
		feature: Feature::ClassLiterals,
		kind: BuiltinKind::Source(CLASS),
		methods: &[("getName", "()Ljava/lang/String;"), ("toString", "()Ljava/lang/String;")],
		used_by_runtime: true,
	},
];

fn builtin(name: &str) -> Option<&'static Builtin> {
	BUILTINS.iter().find(|builtin| builtin.name == name)
}

/// The classes the runtime defines. These are provided by default, see [`crate::Options`].
pub fn builtin_classes() -> impl Iterator<Item=&'static str> {
	BUILTINS.iter().map(|builtin| builtin.name)
}

/// The feature that defines a builtin class, [`None`] if the class isn't builtin.
pub fn builtin_feature(name: &str) -> Option<Feature> {
	builtin(name).map(|builtin| builtin.feature)
}

/// Whether a builtin class has an instance method, declared by itself or one of its super classes. Constructors aren't
/// inherited. [`None`] if the class isn't builtin.
///
/// Builtin classes have neither static methods nor fields.
pub fn builtin_has_method(class: &str, name: &str, descriptor: &str) -> Option<bool> {
	let mut current = builtin(class)?;
	loop {
		if current.methods.iter().any(|&(n, d)| n == name && d == descriptor) {
			return Some(true);
		}
		if name == Method::INIT {
			return Some(false);
		}
		match current.super_class.and_then(builtin) {
			Some(super_class) => current = super_class,
			None => return Some(false),
		}
	}
}

/// Writes the runtime for the given features.
///
/// Builtin classes are written if they're in `provided`, so that they can be replaced by translated ones. The ones the
/// runtime functions throw are also written if they're neither provided nor translated.
pub fn emit(features: &Features, provided: &IndexSet<ClassName>, translated: &IndexMap<ClassName, ClassFile>) -> String {
	let mut out = String::new();
	for feature in features.iter() {
		let _ = writeln!(out, "// {}", feature.name());
		out.push_str(feature.source());
		for builtin in BUILTINS.iter().filter(|builtin| builtin.feature == feature) {
			if provided.contains(builtin.name) {
				builtin.write(&mut out);
			} else if builtin.used_by_runtime && !translated.contains_key(builtin.name) {
				debug!("writing {} for the runtime, it's neither provided nor translated", builtin.name);
				builtin.write(&mut out);
			}
		}
	}
	out
}

const CLASS_MODEL: &str = r#"var $vm = {};
$vm.classes = [];
$vm.byName = {};
$vm.defineClass = function(ctor, name, superCtor, interfaces, isInterface) {
	ctor.$name = name;
	ctor.$super = superCtor;
	ctor.$interfaces = interfaces;
	ctor.$isInterface = isInterface;
	if (superCtor) {
		Object.setPrototypeOf(ctor.prototype, superCtor.prototype);
	}
	ctor.prototype.$class = ctor;
	$vm.classes.push(ctor);
	$vm.byName[name] = ctor;
};
$vm.assignable = function(ctor) {
	if (!ctor.$assignable) {
		var set = {};
		set[ctor.$name] = true;
		if (ctor.$super) {
			Object.assign(set, $vm.assignable(ctor.$super));
		}
		ctor.$interfaces.forEach(function(i) {
			Object.assign(set, $vm.assignable(i));
		});
		ctor.$assignable = set;
	}
	return ctor.$assignable;
};
$vm.link = function() {
	var linked = {};
	var link = function(ctor) {
		if (linked[ctor.$name]) {
			return;
		}
		linked[ctor.$name] = true;
		if (ctor.$super) {
			link(ctor.$super);
		}
		if (ctor.$isInterface) {
			return;
		}
		Object.keys($vm.assignable(ctor)).forEach(function(name) {
			var i = $vm.byName[name];
			if (!i || !i.$isInterface) {
				return;
			}
			Object.getOwnPropertyNames(i.prototype).forEach(function(key) {
				if (key !== "constructor" && typeof i.prototype[key] === "function" && !(key in ctor.prototype)) {
					ctor.prototype[key] = i.prototype[key];
				}
			});
		});
	};
	$vm.classes.forEach(link);
};
$vm.nameOf = function(o) {
	if (typeof o === "string") {
		return "java/lang/String";
	}
	if (Array.isArray(o)) {
		return o.$desc || "[Ljava/lang/Object;";
	}
	return o.$class ? o.$class.$name : "java/lang/Object";
};
$vm.nextHash = 0;
$vm.identityHash = function(o) {
	if (o.$hash === undefined) {
		Object.defineProperty(o, "$hash", { value: ++$vm.nextHash });
	}
	return o.$hash;
};
"#;

const OBJECT: &str = r#"function java_lang_Object() {
}
$vm.defineClass(java_lang_Object, "java/lang/Object", null, [], false);
java_lang_Object.prototype.consV = function() {
};
java_lang_Object.prototype.hashCodeI = function() {
	return $vm.identityHash(this);
};
java_lang_Object.prototype.equalsZLjava_lang_Object = function(other) {
	return this === other ? 1 : 0;
};
java_lang_Object.prototype.toStringLjava_lang_String = function() {
	return $vm.nameOf(this).replace(/\//g, ".") + "@" + this.hashCodeI().toString(16);
};
"#;

const STRING: &str = r#"String.prototype.lengthI = function() {
	return this.length;
};
String.prototype.charAtCI = function(index) {
	if (index < 0 || index >= this.length) {
		throw new RangeError("index " + index + " out of range for length " + this.length);
	}
	return this.charCodeAt(index);
};
String.prototype.isEmptyZ = function() {
	return this.length === 0 ? 1 : 0;
};
String.prototype.equalsZLjava_lang_Object = function(other) {
	return typeof other === "string" && this.valueOf() === other ? 1 : 0;
};
String.prototype.hashCodeI = function() {
	var h = 0;
	for (var i = 0; i < this.length; i++) {
		h = (Math.imul(31, h) + this.charCodeAt(i)) | 0;
	}
	return h;
};
String.prototype.concatLjava_lang_StringLjava_lang_String = function(other) {
	return this.valueOf() + other.valueOf();
};
String.prototype.toStringLjava_lang_String = function() {
	return this.valueOf();
};
String.prototype.compareToILjava_lang_String = function(other) {
	var n = Math.min(this.length, other.length);
	for (var i = 0; i < n; i++) {
		var d = this.charCodeAt(i) - other.charCodeAt(i);
		if (d !== 0) {
			return d;
		}
	}
	return this.length - other.length;
};
String.prototype.compareToILjava_lang_Object = String.prototype.compareToILjava_lang_String;
"#;

const EXCEPTIONS: &str = r#"$vm.newThrowable = function(ctor, message) {
	var e = new ctor();
	e.consVLjava_lang_String(message);
	return e;
};
$vm.wrap = function(e) {
	if (e instanceof java_lang_Throwable) {
		return e;
	}
	if (e instanceof TypeError) {
		return $vm.newThrowable(java_lang_NullPointerException, e.message);
	}
	if (e instanceof RangeError && /index/.test(e.message)) {
		return $vm.newThrowable(java_lang_IndexOutOfBoundsException, e.message);
	}
	return $vm.newThrowable(java_lang_Error, String(e));
};
"#;

const THROWABLE: &str = r#"function java_lang_Throwable() {
	java_lang_Object.call(this);
	this.$message = null;
	this.$cause = null;
}
$vm.defineClass(java_lang_Throwable, "java/lang/Throwable", java_lang_Object, [], false);
java_lang_Throwable.prototype.consV = function() {
};
java_lang_Throwable.prototype.consVLjava_lang_String = function(message) {
	this.$message = message;
};
java_lang_Throwable.prototype.consVLjava_lang_StringLjava_lang_Throwable = function(message, cause) {
	this.$message = message;
	this.$cause = cause;
};
java_lang_Throwable.prototype.consVLjava_lang_Throwable = function(cause) {
	this.$message = cause === null ? null : cause.toStringLjava_lang_String();
	this.$cause = cause;
};
java_lang_Throwable.prototype.getMessageLjava_lang_String = function() {
	return this.$message;
};
java_lang_Throwable.prototype.getCauseLjava_lang_Throwable = function() {
	return this.$cause;
};
java_lang_Throwable.prototype.toStringLjava_lang_String = function() {
	var name = $vm.nameOf(this).replace(/\//g, ".");
	return this.$message === null ? name : name + ": " + this.$message;
};
"#;

const NULL_CHECKS: &str = r#"$vm.nn = function(o) {
	if (o === null || o === undefined) {
		throw $vm.newThrowable(java_lang_NullPointerException, null);
	}
	return o;
};
"#;

const ARITHMETIC: &str = r#"$vm.divisionByZero = function() {
	return $vm.newThrowable(java_lang_ArithmeticException, "/ by zero");
};
$vm.idiv = function(a, b) {
	if (b === 0) {
		throw $vm.divisionByZero();
	}
	return (a / b) | 0;
};
$vm.irem = function(a, b) {
	if (b === 0) {
		throw $vm.divisionByZero();
	}
	return (a % b) | 0;
};
$vm.ldiv = function(a, b) {
	if (b === 0n) {
		throw $vm.divisionByZero();
	}
	return BigInt.asIntN(64, a / b);
};
$vm.lrem = function(a, b) {
	if (b === 0n) {
		throw $vm.divisionByZero();
	}
	return a % b;
};
"#;

const CONVERSIONS: &str = r#"$vm.d2i = function(v) {
	if (v !== v) {
		return 0;
	}
	if (v >= 2147483647) {
		return 2147483647;
	}
	if (v <= -2147483648) {
		return -2147483648;
	}
	return Math.trunc(v);
};
$vm.d2l = function(v) {
	if (v !== v) {
		return 0n;
	}
	if (v >= 9223372036854775807) {
		return 9223372036854775807n;
	}
	if (v <= -9223372036854775808) {
		return -9223372036854775808n;
	}
	return BigInt(Math.trunc(v));
};
"#;

const COMPARES: &str = r#"$vm.cmp = function(a, b) {
	return a < b ? -1 : (a > b ? 1 : 0);
};
$vm.cmpl = function(a, b) {
	return a > b ? 1 : (a === b ? 0 : -1);
};
$vm.cmpg = function(a, b) {
	return a < b ? -1 : (a === b ? 0 : 1);
};
"#;

const LONGS: &str = r#"$vm.toLong = function(v) {
	if (typeof v === "bigint") {
		return BigInt.asIntN(64, v);
	}
	return BigInt.asIntN(64, BigInt(Math.trunc(Number(v))));
};
"#;

const TYPE_CHECKS: &str = r#"$vm.stringTypes = {
	"java/lang/String": true,
	"java/lang/Object": true,
	"java/io/Serializable": true,
	"java/lang/Comparable": true,
	"java/lang/CharSequence": true
};
$vm.classAssignable = function(from, to) {
	if (from === to || to === "java/lang/Object") {
		return true;
	}
	if (from === "java/lang/String") {
		return !!$vm.stringTypes[to];
	}
	var ctor = $vm.byName[from];
	return !!ctor && !!$vm.assignable(ctor)[to];
};
$vm.arrayAssignable = function(from, to) {
	if (to.charAt(0) !== "[") {
		return to === "java/lang/Object" || to === "java/lang/Cloneable" || to === "java/io/Serializable";
	}
	var f = from.substring(1);
	var t = to.substring(1);
	if (f === t) {
		return true;
	}
	if (f.charAt(0) === "L" && t.charAt(0) === "L") {
		return $vm.classAssignable(f.substring(1, f.length - 1), t.substring(1, t.length - 1));
	}
	if (f.charAt(0) === "[") {
		if (t.charAt(0) === "[") {
			return $vm.arrayAssignable(f, t);
		}
		return t === "Ljava/lang/Object;" || t === "Ljava/lang/Cloneable;" || t === "Ljava/io/Serializable;";
	}
	return false;
};
$vm.isInst = function(o, name) {
	if (o === null || o === undefined) {
		return false;
	}
	var from = $vm.nameOf(o);
	return from.charAt(0) === "[" ? $vm.arrayAssignable(from, name) : $vm.classAssignable(from, name);
};
$vm.cast = function(o, name) {
	if (o !== null && o !== undefined && !$vm.isInst(o, name)) {
		throw $vm.newThrowable(java_lang_ClassCastException,
			$vm.nameOf(o).replace(/\//g, ".") + " cannot be cast to " + name.replace(/\//g, "."));
	}
	return o;
};
"#;

const ARRAYS: &str = r#"$vm.newArray = function(desc, length) {
	if (length < 0) {
		throw $vm.newThrowable(java_lang_NegativeArraySizeException, String(length));
	}
	var element = desc.charAt(1);
	var value = element === "L" || element === "[" ? null : (element === "J" ? 0n : 0);
	var array = new Array(length).fill(value);
	array.$desc = desc;
	return array;
};
$vm.multiNewArray = function(desc, lengths) {
	lengths.forEach(function(length) {
		if (length < 0) {
			throw $vm.newThrowable(java_lang_NegativeArraySizeException, String(length));
		}
	});
	var array = $vm.newArray(desc, lengths[0]);
	if (lengths.length > 1) {
		for (var i = 0; i < array.length; i++) {
			array[i] = $vm.multiNewArray(desc.substring(1), lengths.slice(1));
		}
	}
	return array;
};
$vm.checkIndex = function(array, index) {
	$vm.nn(array);
	if (index < 0 || index >= array.length) {
		throw $vm.newThrowable(java_lang_ArrayIndexOutOfBoundsException,
			"Index " + index + " out of bounds for length " + array.length);
	}
	return array;
};
$vm.aget = function(array, index) {
	return $vm.checkIndex(array, index)[index];
};
$vm.aput = function(array, index, value) {
	$vm.checkIndex(array, index)[index] = value;
};
$vm.baput = function(array, index, value) {
	$vm.checkIndex(array, index)[index] = array.$desc === "[Z" ? value & 1 : (value << 24) >> 24;
};
$vm.aaput = function(array, index, value) {
	$vm.checkIndex(array, index);
	var element = (array.$desc || "[Ljava/lang/Object;").substring(1);
	if (element.charAt(0) === "L") {
		element = element.substring(1, element.length - 1);
	}
	if (value !== null && value !== undefined && !$vm.isInst(value, element)) {
		throw $vm.newThrowable(java_lang_ArrayStoreException, $vm.nameOf(value).replace(/\//g, "."));
	}
	array[index] = value;
};
$vm.aclone = function(array) {
	var copy = $vm.nn(array).slice();
	copy.$desc = array.$desc;
	return copy;
};
"#;

const CLASS_LITERALS: &str = r#"$vm.literals = {};
$vm.classOf = function(name) {
	var literal = $vm.literals[name];
	if (!literal) {
		literal = new java_lang_Class();
		literal.$name = name;
		$vm.literals[name] = literal;
	}
	return literal;
};
java_lang_Object.prototype.getClassLjava_lang_Class = function() {
	return $vm.classOf($vm.nameOf(this));
};
String.prototype.getClassLjava_lang_Class = java_lang_Object.prototype.getClassLjava_lang_Class;
"#;

const CLASS: &str = r#"function java_lang_Class() {
	java_lang_Object.call(this);
}
$vm.defineClass(java_lang_Class, "java/lang/Class", java_lang_Object, [], false);
java_lang_Class.prototype.getNameLjava_lang_String = function() {
	return this.$name.replace(/\//g, ".");
};
java_lang_Class.prototype.toStringLjava_lang_String = function() {
	var ctor = $vm.byName[this.$name];
	return (ctor && ctor.$isInterface ? "interface " : "class ") + this.getNameLjava_lang_String();
};
"#;

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use indexmap::{IndexMap, IndexSet};
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use crate::runtime::{builtin_classes, builtin_feature, builtin_has_method, emit, Feature, Features};

	fn all_provided() -> IndexSet<ClassName> {
		builtin_classes().map(ClassName::from).collect()
	}

	#[test]
	fn dependencies_are_included() {
		let mut features = Features::new();
		features.insert(Feature::Arrays);
		assert_eq!(features.iter().collect::<Vec<_>>(), vec![
			Feature::ClassModel,
			Feature::Exceptions,
			Feature::NullChecks,
			Feature::TypeChecks,
			Feature::Arrays,
		]);
	}

	#[test]
	fn only_what_is_used() {
		let mut features = Features::new();
		features.insert(Feature::ClassModel);
		let small = emit(&features, &all_provided(), &IndexMap::new());
		assert!(small.contains("$vm.defineClass = function"));
		assert!(small.contains("function java_lang_Object() {"));
		assert!(!small.contains("$vm.idiv"));
		assert!(!small.contains("function java_lang_Throwable() {"));

		features.insert(Feature::Arithmetic);
		let larger = emit(&features, &all_provided(), &IndexMap::new());
		assert!(larger.len() > small.len());
		assert_eq!(larger.matches("$vm.idiv = function").count(), 1);
		assert_eq!(larger.matches("$vm.defineClass = function").count(), 1);
		assert!(larger.contains("function java_lang_ArithmeticException() {\n\tjava_lang_RuntimeException.call(this);\n}"));
	}

	#[test]
	fn canonical_order() {
		let mut features = Features::new();
		features.insert(Feature::Compares);
		features.insert(Feature::ClassLiterals);
		features.insert(Feature::Longs);
		let out = emit(&features, &all_provided(), &IndexMap::new());

		let positions: Vec<_> = ["// class model", "// compares", "// longs", "// class literals"].into_iter()
			.map(|x| out.find(x))
			.collect();
		assert!(positions.iter().all(Option::is_some), "{positions:?}");
		assert!(positions.windows(2).all(|x| x[0] < x[1]), "{positions:?}");
	}

	#[test]
	fn builtins_can_be_replaced() {
		let mut features = Features::new();
		features.insert(Feature::ClassModel);
		let out = emit(&features, &IndexSet::new(), &IndexMap::new());
		assert!(out.contains("$vm.link = function"));
		assert!(!out.contains("function java_lang_Object() {"));
		assert!(!out.contains("String.prototype.lengthI"));
	}

	#[test]
	fn builtin_features() {
		assert_eq!(builtin_feature("java/lang/NullPointerException"), Some(Feature::Exceptions));
		assert_eq!(builtin_feature("java/lang/Class"), Some(Feature::ClassLiterals));
		assert_eq!(builtin_feature("java/io/Serializable"), Some(Feature::ClassModel));
		assert_eq!(builtin_feature("a/B"), None);
	}

	#[test]
	fn builtin_methods() {
		assert_eq!(builtin_has_method("java/lang/String", "length", "()I"), Some(true));
		assert_eq!(builtin_has_method("java/lang/String", "substring", "(I)Ljava/lang/String;"), Some(false));
		assert_eq!(builtin_has_method("java/lang/String", "<init>", "()V"), Some(false));
		assert_eq!(builtin_has_method("java/lang/Object", "<init>", "()V"), Some(true));
		assert_eq!(builtin_has_method("java/lang/ArithmeticException", "<init>", "(Ljava/lang/String;)V"), Some(true));
		assert_eq!(builtin_has_method("java/lang/ArithmeticException", "getMessage", "()Ljava/lang/String;"), Some(true));
		assert_eq!(builtin_has_method("java/lang/ArithmeticException", "hashCode", "()I"), Some(true));
		assert_eq!(builtin_has_method("java/lang/ArithmeticException", "printStackTrace", "()V"), Some(false));
		assert_eq!(builtin_has_method("java/lang/CharSequence", "charAt", "(I)C"), Some(true));
		assert_eq!(builtin_has_method("java/lang/CharSequence", "equals", "(Ljava/lang/Object;)Z"), Some(true));
		assert_eq!(builtin_has_method("a/B", "m", "()V"), None);
	}

	#[test]
	fn exceptions_of_the_runtime_are_always_defined() -> Result<()> {
		let mut features = Features::new();
		features.insert(Feature::Arithmetic);

		let mut provided = IndexSet::new();
		provided.insert(ClassName::from("java/lang/Object"));
		let out = emit(&features, &provided, &IndexMap::new());
		assert!(out.contains("function java_lang_Object() {"));
		assert!(out.contains("function java_lang_Throwable() {"));
		assert!(out.contains("function java_lang_RuntimeException() {\n\tjava_lang_Exception.call(this);\n}"));
		assert!(out.contains("function java_lang_ArithmeticException() {"));
		assert!(out.contains("function java_lang_NullPointerException() {"));
		assert!(!out.contains("function java_lang_IllegalStateException() {"));
		assert!(!out.contains("String.prototype.lengthI"));

		let mut translated = IndexMap::new();
		let class = raw_class_file::ClassFile::new("java/lang/ArithmeticException", Some("java/lang/RuntimeException"));
		let class = duke::parse(&class.to_bytes())?;
		translated.insert(class.name.clone(), class);
		let out = emit(&features, &provided, &translated);
		assert!(!out.contains("function java_lang_ArithmeticException() {"));
		assert!(out.contains("function java_lang_RuntimeException() {"));
		Ok(())
	}
}
