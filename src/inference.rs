//! Sample ingestion: stream JSON values in, fold them into a join-semilattice
//! of evidence, then lower the evidence into generation 0 (see `lower`).
//!
//! - Join ⊔ is associative and commutative up to property order, so sample
//!   order only decides the order properties are listed in. Counts add up, so
//!   it is not idempotent.
//! - Strings keep every literal with its count, or the sub-format they match;
//!   deciding what that means is left to the string pass.
pub mod num;
pub mod obj;
pub mod str;

use serde_json::{Map, Value};

pub use num::NumC;
pub use obj::{FieldC, ObjC};
pub use str::StrC;

// ------------------------------- Policy ---------------------------------- //

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Recognise dates, uuids, uris, … inside strings.
    pub detect_formats: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self { detect_formats: true }
    }
}

// ------------------------------ Evidence ---------------------------------- //

/// One arm per JSON kind; absent arms were never observed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evidence {
    pub nullable: bool,
    pub has_bool: bool,
    pub num: Option<NumC>,
    pub str_: Option<StrC>,
    pub arr: Option<ArrC>,
    pub obj: Option<ObjC>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrC {
    pub item: Box<Evidence>,
}

impl Evidence {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_bottom(&self) -> bool {
        !self.nullable
            && !self.has_bool
            && self.num.is_none()
            && self.str_.is_none()
            && self.arr.is_none()
            && self.obj.is_none()
    }
}

// ------------------------------ Observe ---------------------------------- //

pub fn observe_value(v: &Value, options: InferenceOptions) -> Evidence {
    match v {
        Value::Null => Evidence { nullable: true, ..Evidence::default() },
        Value::Bool(_) => Evidence { has_bool: true, ..Evidence::default() },
        Value::Number(n) => Evidence { num: Some(NumC::observe(n)), ..Evidence::default() },
        Value::String(s) => Evidence { str_: Some(StrC::observe(s, options)), ..Evidence::default() },
        Value::Array(xs) => observe_array(xs, options),
        Value::Object(m) => observe_object(m, options),
    }
}

fn observe_array(xs: &[Value], options: InferenceOptions) -> Evidence {
    let item = xs
        .iter()
        .fold(Evidence::empty(), |acc, el| join(&acc, &observe_value(el, options)));
    let arr = ArrC { item: Box::new(item) };
    Evidence { arr: Some(arr), ..Evidence::default() }
}

fn observe_object(map: &Map<String, Value>, options: InferenceOptions) -> Evidence {
    let mut obj = ObjC { seen_objects: 1, ..ObjC::default() };
    for (k, v) in map {
        obj.fields.insert(k.clone(), FieldC { ty: observe_value(v, options), present_in: 1 });
    }
    Evidence { obj: Some(obj), ..Evidence::default() }
}

// -------------------------------- Join (⊔) -------------------------------- //

fn join_opt<T: Clone>(a: &Option<T>, b: &Option<T>, f: impl Fn(&T, &T) -> T) -> Option<T> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => Some(f(x, y)),
    }
}

pub fn join(a: &Evidence, b: &Evidence) -> Evidence {
    Evidence {
        nullable: a.nullable || b.nullable,
        has_bool: a.has_bool || b.has_bool,
        num: join_opt(&a.num, &b.num, NumC::join),
        str_: join_opt(&a.str_, &b.str_, StrC::join),
        arr: join_opt(&a.arr, &b.arr, |x, y| ArrC {
            item: Box::new(join(&x.item, &y.item)),
        }),
        obj: join_opt(&a.obj, &b.obj, ObjC::join),
    }
}

// ------------------------------- Front API -------------------------------- //

#[derive(Debug, Default)]
pub struct Inference {
    state: Evidence,
    options: InferenceOptions,
    samples: u64,
}

impl Inference {
    pub fn new(options: InferenceOptions) -> Self {
        Self { state: Evidence::empty(), options, samples: 0 }
    }

    pub fn observe_value(&mut self, v: &Value) {
        let obs = observe_value(v, self.options);
        self.state = join(&self.state, &obs);
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn solve(&self) -> Evidence {
        self.state.clone()
    }
}

pub fn infer_from_values<'a, I>(values: I, options: InferenceOptions) -> Evidence
where
    I: IntoIterator<Item = &'a Value>,
{
    values
        .into_iter()
        .fold(Evidence::empty(), |acc, v| join(&acc, &observe_value(v, options)))
}

// ------------------------------- Tests ------------------------------------ //
