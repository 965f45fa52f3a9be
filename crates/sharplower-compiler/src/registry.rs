//! Type and member registry.
//!
//! [`TypeRegistry`] is what resolution and lowering consult about types: is it
//! a value type, what are its fields and accessors, and, for nullable value
//! types, which four operations implement the wrapper. Every registered value
//! type gets its nullable instantiation registered alongside it, so
//! "nullable-of-T" is always available by hash without mutating the registry
//! during compilation.
//!
//! ```
//! use sharplower_compiler::TypeRegistry;
//! use sharplower_core::primitives;
//!
//! let registry = TypeRegistry::with_primitives();
//! let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
//! let info = registry.nullable_info(nullable_int).unwrap();
//! assert_eq!(info.underlying, primitives::INT32);
//! assert_eq!(registry.type_name(nullable_int), "int?");
//! ```

use rustc_hash::FxHashMap;
use sharplower_core::{TypeHash, primitives};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Built-in numeric, `bool` and `void`.
    Primitive,
    /// User struct.
    Value,
    /// Class or `string`.
    Reference,
    /// `T?` over a value type `T`.
    Nullable,
    /// `T[]`.
    Array,
    /// Event handler type.
    Delegate,
    /// Type of the bare `null` literal.
    Null,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeHash,
    pub readonly: bool,
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub ty: TypeHash,
    pub getter: Option<TypeHash>,
    pub setter: Option<TypeHash>,
}

#[derive(Debug, Clone)]
pub struct EventDef {
    pub name: String,
    pub handler: TypeHash,
    pub add: TypeHash,
    pub remove: TypeHash,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub hash: TypeHash,
    pub name: String,
    /// Declaring type for methods, constructors and accessors.
    pub owner: Option<TypeHash>,
    pub params: Vec<TypeHash>,
    pub return_type: TypeHash,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub hash: TypeHash,
    pub name: String,
    pub kind: TypeKind,
    /// Underlying type of a nullable, element type of an array.
    pub element: Option<TypeHash>,
    pub fields: Vec<FieldDef>,
    pub properties: Vec<PropertyDef>,
    pub events: Vec<EventDef>,
    pub constructors: Vec<TypeHash>,
}

impl TypeDef {
    fn new(hash: TypeHash, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            hash,
            name: name.into(),
            kind,
            element: None,
            fields: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            constructors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GlobalDef {
    pub hash: TypeHash,
    pub name: String,
    pub ty: TypeHash,
}

/// A user-defined conversion operator, called as a one-argument function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserConversion {
    pub function: TypeHash,
    pub from: TypeHash,
    pub to: TypeHash,
    pub implicit: bool,
}

/// The operations that implement a nullable instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullableInfo {
    pub nullable: TypeHash,
    pub underlying: TypeHash,
    /// `bool get_HasValue()`
    pub has_value: TypeHash,
    /// `T get_Value()`, fails when empty.
    pub value: TypeHash,
    /// `T GetValueOrDefault()`, zero when empty.
    pub get_value_or_default: TypeHash,
    /// `T?(T value)`
    pub constructor: TypeHash,
}

/// Which nullable operation a method hash names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullableMethod {
    HasValue,
    Value,
    GetValueOrDefault,
    Construct,
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeHash, TypeDef>,
    type_names: FxHashMap<String, TypeHash>,
    functions: FxHashMap<TypeHash, FunctionDef>,
    /// Global functions by name; no overloading.
    function_names: FxHashMap<String, TypeHash>,
    globals: FxHashMap<String, GlobalDef>,
    conversions: FxHashMap<(TypeHash, TypeHash), UserConversion>,
    nullables: FxHashMap<TypeHash, NullableInfo>,
    nullable_methods: FxHashMap<TypeHash, (NullableMethod, TypeHash)>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in types and their nullable forms.
    pub fn with_primitives() -> Self {
        let mut registry = Self::new();
        registry.insert_type(TypeDef::new(primitives::VOID, "void", TypeKind::Primitive));
        registry.insert_type(TypeDef::new(primitives::NULL, "<null>", TypeKind::Null));
        registry.insert_type(TypeDef::new(
            primitives::STRING,
            "string",
            TypeKind::Reference,
        ));
        for (hash, name) in [
            (primitives::BOOL, "bool"),
            (primitives::INT8, "sbyte"),
            (primitives::INT16, "short"),
            (primitives::INT32, "int"),
            (primitives::INT64, "long"),
            (primitives::UINT8, "byte"),
            (primitives::FLOAT, "float"),
            (primitives::DOUBLE, "double"),
        ] {
            registry.insert_type(TypeDef::new(hash, name, TypeKind::Primitive));
            registry.register_nullable(hash);
        }
        registry
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a struct with the given fields, plus its nullable form.
    pub fn add_struct(&mut self, name: &str, fields: &[(&str, TypeHash)]) -> TypeHash {
        let hash = TypeHash::from_name(name);
        let mut def = TypeDef::new(hash, name, TypeKind::Value);
        def.fields = field_defs(fields);
        self.insert_type(def);
        self.register_nullable(hash);
        hash
    }

    /// Register a class with the given fields and a parameterless constructor.
    pub fn add_class(&mut self, name: &str, fields: &[(&str, TypeHash)]) -> TypeHash {
        let hash = TypeHash::from_name(name);
        let mut def = TypeDef::new(hash, name, TypeKind::Reference);
        def.fields = field_defs(fields);
        self.insert_type(def);
        self.add_constructor(hash, &[]);
        hash
    }

    pub fn add_delegate(&mut self, name: &str) -> TypeHash {
        let hash = TypeHash::from_name(name);
        self.insert_type(TypeDef::new(hash, name, TypeKind::Delegate));
        hash
    }

    /// Register `element[]`.
    pub fn add_array(&mut self, element: TypeHash) -> TypeHash {
        let name = format!("{}[]", self.type_name(element));
        let hash = TypeHash::from_name(&name);
        let mut def = TypeDef::new(hash, name, TypeKind::Array);
        def.element = Some(element);
        self.insert_type(def);
        hash
    }

    pub fn add_constructor(&mut self, owner: TypeHash, params: &[TypeHash]) -> TypeHash {
        let hash = TypeHash::from_constructor(owner, params);
        let name = self.type_name(owner);
        self.functions.insert(
            hash,
            FunctionDef {
                hash,
                name,
                owner: Some(owner),
                params: params.to_vec(),
                return_type: owner,
            },
        );
        if let Some(def) = self.types.get_mut(&owner) {
            def.constructors.push(hash);
        }
        hash
    }

    pub fn make_readonly(&mut self, owner: TypeHash, field: &str) {
        if let Some(f) = self
            .types
            .get_mut(&owner)
            .and_then(|def| def.fields.iter_mut().find(|f| f.name == field))
        {
            f.readonly = true;
        }
    }

    /// Register a property with accessor methods `get_{name}` / `set_{name}`.
    pub fn add_property(
        &mut self,
        owner: TypeHash,
        name: &str,
        ty: TypeHash,
        readable: bool,
        writable: bool,
    ) -> PropertyDef {
        let getter =
            readable.then(|| self.add_method(owner, &format!("get_{name}"), &[], ty));
        let setter = writable.then(|| {
            self.add_method(owner, &format!("set_{name}"), &[ty], primitives::VOID)
        });
        let property = PropertyDef {
            name: name.to_string(),
            ty,
            getter,
            setter,
        };
        if let Some(def) = self.types.get_mut(&owner) {
            def.properties.push(property.clone());
        }
        property
    }

    /// Register an event with `add_{name}` / `remove_{name}` accessors.
    pub fn add_event(&mut self, owner: TypeHash, name: &str, handler: TypeHash) -> EventDef {
        let add = self.add_method(owner, &format!("add_{name}"), &[handler], primitives::VOID);
        let remove = self.add_method(
            owner,
            &format!("remove_{name}"),
            &[handler],
            primitives::VOID,
        );
        let event = EventDef {
            name: name.to_string(),
            handler,
            add,
            remove,
        };
        if let Some(def) = self.types.get_mut(&owner) {
            def.events.push(event.clone());
        }
        event
    }

    pub fn add_method(
        &mut self,
        owner: TypeHash,
        name: &str,
        params: &[TypeHash],
        return_type: TypeHash,
    ) -> TypeHash {
        let hash = TypeHash::from_method(owner, name, params);
        self.functions.insert(
            hash,
            FunctionDef {
                hash,
                name: name.to_string(),
                owner: Some(owner),
                params: params.to_vec(),
                return_type,
            },
        );
        hash
    }

    pub fn add_function(&mut self, name: &str, params: &[TypeHash], return_type: TypeHash) -> TypeHash {
        let hash = TypeHash::from_function(name, params);
        self.functions.insert(
            hash,
            FunctionDef {
                hash,
                name: name.to_string(),
                owner: None,
                params: params.to_vec(),
                return_type,
            },
        );
        self.function_names.insert(name.to_string(), hash);
        hash
    }

    pub fn add_global(&mut self, name: &str, ty: TypeHash) -> TypeHash {
        let hash = TypeHash::from_global(name);
        self.globals.insert(
            name.to_string(),
            GlobalDef {
                hash,
                name: name.to_string(),
                ty,
            },
        );
        hash
    }

    /// Register a user-defined conversion operator `from -> to`.
    pub fn add_conversion(&mut self, from: TypeHash, to: TypeHash, implicit: bool) -> TypeHash {
        let name = format!(
            "op_{}<{}>",
            if implicit { "Implicit" } else { "Explicit" },
            self.type_name(to)
        );
        let function = TypeHash::from_function(&name, &[from]);
        self.functions.insert(
            function,
            FunctionDef {
                hash: function,
                name,
                owner: None,
                params: vec![from],
                return_type: to,
            },
        );
        self.conversions.insert(
            (from, to),
            UserConversion {
                function,
                from,
                to,
                implicit,
            },
        );
        function
    }

    fn insert_type(&mut self, def: TypeDef) {
        self.type_names.insert(def.name.clone(), def.hash);
        self.types.insert(def.hash, def);
    }

    fn register_nullable(&mut self, underlying: TypeHash) -> NullableInfo {
        let nullable = TypeHash::nullable_of(underlying);
        if let Some(info) = self.nullables.get(&nullable) {
            return *info;
        }

        let mut def = TypeDef::new(
            nullable,
            format!("{}?", self.type_name(underlying)),
            TypeKind::Nullable,
        );
        def.element = Some(underlying);
        self.insert_type(def);

        let info = NullableInfo {
            nullable,
            underlying,
            has_value: self.add_method(nullable, "get_HasValue", &[], primitives::BOOL),
            value: self.add_method(nullable, "get_Value", &[], underlying),
            get_value_or_default: self.add_method(nullable, "GetValueOrDefault", &[], underlying),
            constructor: self.add_constructor(nullable, &[underlying]),
        };
        for (method, kind) in [
            (info.has_value, NullableMethod::HasValue),
            (info.value, NullableMethod::Value),
            (info.get_value_or_default, NullableMethod::GetValueOrDefault),
            (info.constructor, NullableMethod::Construct),
        ] {
            self.nullable_methods.insert(method, (kind, nullable));
        }
        self.nullables.insert(nullable, info);
        info
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    pub fn get(&self, hash: TypeHash) -> Option<&TypeDef> {
        self.types.get(&hash)
    }

    pub fn kind(&self, hash: TypeHash) -> Option<TypeKind> {
        self.types.get(&hash).map(|def| def.kind)
    }

    /// Look a type up by name; a trailing `?` names the nullable form.
    pub fn lookup_type(&self, name: &str) -> Option<TypeHash> {
        self.type_names.get(name).copied()
    }

    /// Display name; unknown hashes print as their hex value.
    pub fn type_name(&self, hash: TypeHash) -> String {
        match self.types.get(&hash) {
            Some(def) => def.name.clone(),
            None => hash.to_string(),
        }
    }

    pub fn is_value_type(&self, hash: TypeHash) -> bool {
        match self.kind(hash) {
            Some(TypeKind::Primitive) => hash != primitives::VOID,
            Some(TypeKind::Value | TypeKind::Nullable) => true,
            _ => false,
        }
    }

    pub fn is_reference_type(&self, hash: TypeHash) -> bool {
        matches!(
            self.kind(hash),
            Some(TypeKind::Reference | TypeKind::Array | TypeKind::Delegate)
        )
    }

    pub fn is_nullable(&self, hash: TypeHash) -> bool {
        self.nullables.contains_key(&hash)
    }

    /// The nullable operations when `hash` is a nullable instantiation.
    pub fn nullable_info(&self, hash: TypeHash) -> Option<NullableInfo> {
        self.nullables.get(&hash).copied()
    }

    /// The nullable form of a value type. `None` for reference types and
    /// for types that are already nullable.
    pub fn nullable_of(&self, underlying: TypeHash) -> Option<TypeHash> {
        let nullable = TypeHash::nullable_of(underlying);
        self.nullables.contains_key(&nullable).then_some(nullable)
    }

    /// Identify a nullable operation by method or constructor hash.
    pub fn nullable_method(&self, hash: TypeHash) -> Option<(NullableMethod, NullableInfo)> {
        let (method, nullable) = self.nullable_methods.get(&hash)?;
        Some((*method, self.nullables.get(nullable).copied()?))
    }

    pub fn array_element(&self, hash: TypeHash) -> Option<TypeHash> {
        self.types
            .get(&hash)
            .filter(|def| def.kind == TypeKind::Array)
            .and_then(|def| def.element)
    }

    /// A field's index within its owner, and its definition.
    pub fn field(&self, owner: TypeHash, name: &str) -> Option<(u16, &FieldDef)> {
        let def = self.types.get(&owner)?;
        def.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (i as u16, f))
    }

    pub fn property(&self, owner: TypeHash, name: &str) -> Option<&PropertyDef> {
        self.types
            .get(&owner)?
            .properties
            .iter()
            .find(|p| p.name == name)
    }

    pub fn event(&self, owner: TypeHash, name: &str) -> Option<&EventDef> {
        self.types
            .get(&owner)?
            .events
            .iter()
            .find(|e| e.name == name)
    }

    /// Whether `owner` declares a method of this name (used to reject
    /// assignments to method groups).
    pub fn has_method(&self, owner: TypeHash, name: &str) -> bool {
        self.method(owner, name).is_some()
    }

    /// A method of `owner` by name; methods are not overloaded.
    pub fn method(&self, owner: TypeHash, name: &str) -> Option<&FunctionDef> {
        self.functions
            .values()
            .find(|f| f.owner == Some(owner) && f.name == name)
    }

    /// The constructor of `owner` taking `arity` arguments.
    pub fn constructor(&self, owner: TypeHash, arity: usize) -> Option<&FunctionDef> {
        self.types
            .get(&owner)?
            .constructors
            .iter()
            .filter_map(|hash| self.functions.get(hash))
            .find(|f| f.params.len() == arity)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.function_names
            .get(name)
            .and_then(|hash| self.functions.get(hash))
    }

    pub fn function_by_hash(&self, hash: TypeHash) -> Option<&FunctionDef> {
        self.functions.get(&hash)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalDef> {
        self.globals.get(name)
    }

    pub fn user_conversion(&self, from: TypeHash, to: TypeHash) -> Option<UserConversion> {
        self.conversions.get(&(from, to)).copied()
    }
}

fn field_defs(fields: &[(&str, TypeHash)]) -> Vec<FieldDef> {
    fields
        .iter()
        .map(|(name, ty)| FieldDef {
            name: name.to_string(),
            ty: *ty,
            readonly: false,
        })
        .collect()
}
