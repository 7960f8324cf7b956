use indexmap::IndexMap;

use super::Evidence;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjC {
    /// First-seen order.
    pub fields: IndexMap<String, FieldC>,
    pub seen_objects: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldC {
    pub ty: Evidence,
    pub present_in: u64,
}

impl ObjC {
    pub(super) fn join(a: &Self, b: &Self) -> Self {
        let mut out = a.clone();
        out.seen_objects = a.seen_objects + b.seen_objects;
        for (k, fb) in &b.fields {
            match out.fields.get_mut(k) {
                Some(fa) => {
                    fa.ty = super::join(&fa.ty, &fb.ty);
                    fa.present_in += fb.present_in;
                }
                None => {
                    out.fields.insert(k.clone(), fb.clone());
                }
            }
        }
        out
    }

    /// Present in every object seen.
    pub fn is_required(&self, field: &FieldC) -> bool {
        field.present_in == self.seen_objects
    }
}
