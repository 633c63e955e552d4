//! Type Tags and Dynamic Typechecking
//!
//! Types are encoded as a 64-bit bitset: one bit per value variant in the
//! low bits, modifier flags in the high bits. Composite checks (array-of,
//! dict-of) are expressed with the helpers at the bottom; argument binding
//! lives in `args`, conversions in `coerce`.

pub mod args;
pub mod coerce;

use crate::object::{Obj, ObjStore, ObjType, Value};

pub type TypeTag = u64;

// Modifier flags.
/// Accept null in addition to the listed types.
pub const TAG_ALLOW_NULL: TypeTag = 1 << 59;
/// Marks a composite check carried out by a dedicated helper.
pub const TAG_COMPLEX: TypeTag = 1 << 60;
/// Accept zero or more trailing positional arguments of this type.
pub const TAG_GLOB: TypeTag = 1 << 61;
/// Accept T or array of T; binding wraps bare values into one-element
/// arrays and flattens nested arrays.
pub const TAG_LISTIFY: TypeTag = 1 << 62;

pub const TAG_MASK: TypeTag = TAG_ALLOW_NULL | TAG_COMPLEX | TAG_GLOB | TAG_LISTIFY;

pub const TC_NULL: TypeTag = 1 << 0;
pub const TC_BOOL: TypeTag = 1 << 1;
pub const TC_NUMBER: TypeTag = 1 << 2;
pub const TC_STRING: TypeTag = 1 << 3;
pub const TC_FILE: TypeTag = 1 << 4;
pub const TC_FEATURE_OPT: TypeTag = 1 << 5;
pub const TC_DISABLER: TypeTag = 1 << 6;
pub const TC_ARRAY: TypeTag = 1 << 7;
pub const TC_DICT: TypeTag = 1 << 8;
pub const TC_BUILD_TARGET: TypeTag = 1 << 9;
pub const TC_CUSTOM_TARGET: TypeTag = 1 << 10;
pub const TC_ALIAS_TARGET: TypeTag = 1 << 11;
pub const TC_BOTH_LIBS: TypeTag = 1 << 12;
pub const TC_DEPENDENCY: TypeTag = 1 << 13;
pub const TC_EXTERNAL_PROGRAM: TypeTag = 1 << 14;
pub const TC_INCLUDE_DIRECTORY: TypeTag = 1 << 15;
pub const TC_GENERATOR: TypeTag = 1 << 16;
pub const TC_GENERATED_LIST: TypeTag = 1 << 17;
pub const TC_INSTALL_TARGET: TypeTag = 1 << 18;
pub const TC_SOURCE_SET: TypeTag = 1 << 19;
pub const TC_SOURCE_CONFIGURATION: TypeTag = 1 << 20;
pub const TC_TEST: TypeTag = 1 << 21;
pub const TC_RUN_RESULT: TypeTag = 1 << 22;
pub const TC_ENVIRONMENT: TypeTag = 1 << 23;
pub const TC_CONFIGURATION_DATA: TypeTag = 1 << 24;
pub const TC_COMPILER: TypeTag = 1 << 25;
pub const TC_MACHINE: TypeTag = 1 << 26;
pub const TC_SUBPROJECT: TypeTag = 1 << 27;
pub const TC_MODULE: TypeTag = 1 << 28;
pub const TC_FUNC: TypeTag = 1 << 29;
pub const TC_CAPTURE: TypeTag = 1 << 30;
pub const TC_TYPEINFO: TypeTag = 1 << 31;
pub const TC_MESON: TypeTag = 1 << 32;
pub const TC_OPTION: TypeTag = 1 << 33;

/// Every user-visible type.
pub const TC_ANY: TypeTag = TC_BOOL
    | TC_NUMBER
    | TC_STRING
    | TC_FILE
    | TC_FEATURE_OPT
    | TC_DISABLER
    | TC_ARRAY
    | TC_DICT
    | TC_BUILD_TARGET
    | TC_CUSTOM_TARGET
    | TC_ALIAS_TARGET
    | TC_BOTH_LIBS
    | TC_DEPENDENCY
    | TC_EXTERNAL_PROGRAM
    | TC_INCLUDE_DIRECTORY
    | TC_GENERATOR
    | TC_GENERATED_LIST
    | TC_INSTALL_TARGET
    | TC_SOURCE_SET
    | TC_SOURCE_CONFIGURATION
    | TC_TEST
    | TC_RUN_RESULT
    | TC_ENVIRONMENT
    | TC_CONFIGURATION_DATA
    | TC_COMPILER
    | TC_MACHINE
    | TC_SUBPROJECT
    | TC_MODULE
    | TC_FUNC
    | TC_CAPTURE
    | TC_MESON
    | TC_OPTION;

// Common argument shapes.
pub const TC_EXE: TypeTag =
    TC_STRING | TC_FILE | TC_EXTERNAL_PROGRAM | TC_BUILD_TARGET | TC_CUSTOM_TARGET | TC_BOTH_LIBS;
pub const TC_COERCIBLE_ENV: TypeTag = TC_ENVIRONMENT | TC_STRING | TC_ARRAY | TC_DICT;
pub const TC_COERCIBLE_FILES: TypeTag =
    TC_STRING | TC_CUSTOM_TARGET | TC_BUILD_TARGET | TC_FILE | TC_BOTH_LIBS | TC_GENERATED_LIST;
pub const TC_COERCIBLE_INC: TypeTag = TC_STRING | TC_INCLUDE_DIRECTORY;
pub const TC_COMMAND_ARRAY: TypeTag = TAG_LISTIFY | TC_EXE;
pub const TC_DEPENDS_KW: TypeTag =
    TAG_LISTIFY | TC_BUILD_TARGET | TC_CUSTOM_TARGET | TC_BOTH_LIBS | TC_FILE | TC_ALIAS_TARGET;
pub const TC_INSTALL_MODE_KW: TypeTag = TAG_LISTIFY | TC_STRING | TC_NUMBER | TC_BOOL;
pub const TC_REQUIRED_KW: TypeTag = TC_BOOL | TC_FEATURE_OPT;
pub const TC_LINK_WITH_KW: TypeTag =
    TAG_LISTIFY | TC_BUILD_TARGET | TC_CUSTOM_TARGET | TC_FILE | TC_BOTH_LIBS;
pub const TC_MESSAGE_VARARGS: TypeTag =
    TAG_GLOB | TC_FEATURE_OPT | TC_STRING | TC_BOOL | TC_NUMBER | TC_ARRAY | TC_DICT | TC_FILE;

pub fn obj_type_to_tc(t: ObjType) -> TypeTag {
    match t {
        ObjType::Null => TC_NULL,
        ObjType::Bool => TC_BOOL,
        ObjType::Number => TC_NUMBER,
        ObjType::Str => TC_STRING,
        ObjType::File => TC_FILE,
        ObjType::FeatureOpt => TC_FEATURE_OPT,
        ObjType::Disabler => TC_DISABLER,
        ObjType::Array => TC_ARRAY,
        ObjType::Dict => TC_DICT,
        ObjType::BuildTarget => TC_BUILD_TARGET,
        ObjType::CustomTarget => TC_CUSTOM_TARGET,
        ObjType::AliasTarget => TC_ALIAS_TARGET,
        ObjType::BothLibs => TC_BOTH_LIBS,
        ObjType::Dependency => TC_DEPENDENCY,
        ObjType::ExternalProgram => TC_EXTERNAL_PROGRAM,
        ObjType::IncludeDirectory => TC_INCLUDE_DIRECTORY,
        ObjType::Generator => TC_GENERATOR,
        ObjType::GeneratedList => TC_GENERATED_LIST,
        ObjType::InstallTarget => TC_INSTALL_TARGET,
        ObjType::SourceSet => TC_SOURCE_SET,
        ObjType::SourceConfiguration => TC_SOURCE_CONFIGURATION,
        ObjType::Test => TC_TEST,
        ObjType::RunResult => TC_RUN_RESULT,
        ObjType::Environment => TC_ENVIRONMENT,
        ObjType::ConfigurationData => TC_CONFIGURATION_DATA,
        ObjType::Compiler => TC_COMPILER,
        ObjType::Machine => TC_MACHINE,
        ObjType::Subproject => TC_SUBPROJECT,
        ObjType::Module => TC_MODULE,
        ObjType::Func => TC_FUNC,
        ObjType::Capture => TC_CAPTURE,
        ObjType::TypeInfo => TC_TYPEINFO,
        ObjType::Meson => TC_MESON,
        ObjType::BuildOption => TC_OPTION,
        ObjType::FuncRef => TC_FUNC,
    }
}

/// Map a type annotation name (extended-surface function signatures) to a
/// tag set.
pub fn tag_from_name(name: &str) -> Option<TypeTag> {
    Some(match name {
        "any" => TC_ANY,
        "bool" => TC_BOOL,
        "int" => TC_NUMBER,
        "str" | "string" => TC_STRING,
        "file" => TC_FILE,
        "list" | "array" => TC_ARRAY,
        "dict" => TC_DICT,
        "feature" => TC_FEATURE_OPT,
        "void" | "null" => TC_NULL,
        "dep" | "dependency" => TC_DEPENDENCY,
        _ => return None,
    })
}

/// True iff the value's dynamic type is a member of the set. A tag of zero
/// accepts anything. Typeinfo placeholders check their carried set.
pub fn typecheck(store: &ObjStore, obj: Obj, tag: TypeTag) -> bool {
    if tag & !TAG_MASK == 0 {
        return true;
    }
    if tag & TAG_ALLOW_NULL != 0 && obj.is_null() {
        return true;
    }
    if let Value::TypeInfo(carried) = store.get(obj) {
        return carried & tag & !TAG_MASK != 0;
    }
    obj_type_to_tc(store.obj_type(obj)) & tag != 0
}

/// Composite check: an array whose every element matches `elem`.
pub fn typecheck_array_of(store: &ObjStore, obj: Obj, elem: TypeTag) -> bool {
    match store.as_array(obj) {
        Some(items) => items.iter().all(|&o| typecheck(store, o, elem)),
        None => false,
    }
}

/// Composite check: a dict whose every value matches `elem`.
pub fn typecheck_dict_of(store: &ObjStore, obj: Obj, elem: TypeTag) -> bool {
    match store.as_dict(obj) {
        Some(map) => map.values().all(|&o| typecheck(store, o, elem)),
        None => false,
    }
}

/// Human-readable rendering of a tag set for error messages.
pub fn tag_to_string(tag: TypeTag) -> String {
    let names: &[(TypeTag, &str)] = &[
        (TC_NULL, "void"),
        (TC_BOOL, "bool"),
        (TC_NUMBER, "int"),
        (TC_STRING, "string"),
        (TC_FILE, "file"),
        (TC_FEATURE_OPT, "feature"),
        (TC_DISABLER, "disabler"),
        (TC_ARRAY, "array"),
        (TC_DICT, "dict"),
        (TC_BUILD_TARGET, "build_target"),
        (TC_CUSTOM_TARGET, "custom_target"),
        (TC_ALIAS_TARGET, "alias_target"),
        (TC_BOTH_LIBS, "both_libs"),
        (TC_DEPENDENCY, "dependency"),
        (TC_EXTERNAL_PROGRAM, "external_program"),
        (TC_INCLUDE_DIRECTORY, "include_directory"),
        (TC_GENERATOR, "generator"),
        (TC_GENERATED_LIST, "generated_list"),
        (TC_INSTALL_TARGET, "install_target"),
        (TC_SOURCE_SET, "source_set"),
        (TC_SOURCE_CONFIGURATION, "source_configuration"),
        (TC_TEST, "test"),
        (TC_RUN_RESULT, "run_result"),
        (TC_ENVIRONMENT, "environment"),
        (TC_CONFIGURATION_DATA, "configuration_data"),
        (TC_COMPILER, "compiler"),
        (TC_MACHINE, "machine"),
        (TC_SUBPROJECT, "subproject"),
        (TC_MODULE, "module"),
        (TC_FUNC, "func"),
        (TC_CAPTURE, "capture"),
        (TC_MESON, "meson"),
        (TC_OPTION, "option"),
    ];
    if tag & !TAG_MASK == TC_ANY {
        return "any".to_string();
    }
    let mut parts = Vec::new();
    if tag & TAG_LISTIFY != 0 {
        parts.push("list of".to_string());
    }
    let mut type_names: Vec<&str> = Vec::new();
    for &(bit, name) in names {
        if tag & bit != 0 {
            type_names.push(name);
        }
    }
    if tag & TAG_ALLOW_NULL != 0 {
        type_names.push("void");
    }
    parts.push(type_names.join("|"));
    parts.join(" ")
}

/// Adjust a possibly-negative index against a container length. Returns
/// false when out of bounds.
pub fn bounds_adjust(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let adjusted = if index < 0 { len + index } else { index };
    if adjusted < 0 || adjusted >= len {
        None
    } else {
        Some(adjusted as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typecheck_primitives() {
        let mut store = ObjStore::new();
        let s = store.new_str("x");
        let n = store.new_number(1);
        assert!(typecheck(&store, s, TC_STRING));
        assert!(!typecheck(&store, s, TC_NUMBER));
        assert!(typecheck(&store, n, TC_NUMBER | TC_STRING));
        assert!(typecheck(&store, Obj::TRUE, TC_BOOL));
    }

    #[test]
    fn test_allow_null() {
        let store = ObjStore::new();
        assert!(!typecheck(&store, Obj::NULL, TC_STRING));
        assert!(typecheck(&store, Obj::NULL, TC_STRING | TAG_ALLOW_NULL));
    }

    #[test]
    fn test_zero_tag_accepts_anything() {
        let store = ObjStore::new();
        assert!(typecheck(&store, Obj::TRUE, 0));
    }

    #[test]
    fn test_array_of() {
        let mut store = ObjStore::new();
        let a = store.new_str("a");
        let b = store.new_str("b");
        let arr = store.new_array(vec![a, b]);
        assert!(typecheck_array_of(&store, arr, TC_STRING));
        let n = store.new_number(1);
        let arr2 = store.new_array(vec![a, n]);
        assert!(!typecheck_array_of(&store, arr2, TC_STRING));
    }

    #[test]
    fn test_bounds_adjust() {
        assert_eq!(bounds_adjust(3, 0), Some(0));
        assert_eq!(bounds_adjust(3, -1), Some(2));
        assert_eq!(bounds_adjust(3, 3), None);
        assert_eq!(bounds_adjust(3, -4), None);
    }

    #[test]
    fn test_tag_to_string() {
        assert_eq!(tag_to_string(TC_STRING), "string");
        assert!(tag_to_string(TC_STRING | TC_BOOL).contains("bool"));
        assert!(tag_to_string(TAG_LISTIFY | TC_STRING).starts_with("list of"));
    }
}
