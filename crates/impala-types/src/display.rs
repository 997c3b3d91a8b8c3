//! Canonical type rendering.
//!
//! Bound variables are named by traversal order (`A`, `B`, ...), so two
//! representative-equal closed types always render to the same string.
//! Free variables print their raw identity (`t0`), which keeps distinct free
//! variables distinguishable in diagnostics.

use rustc_hash::FxHashMap;

use crate::node::{TypeId, TypeKind};
use crate::table::TypeTable;
use crate::traits::InstanceId;

#[derive(Default)]
struct DisplayCtx {
    names: FxHashMap<TypeId, String>,
    next: usize,
}

impl DisplayCtx {
    fn fresh_name(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        if n < 26 {
            char::from(b'A' + n as u8).to_string()
        } else {
            format!("T{}", n)
        }
    }
}

impl TypeTable {
    /// Render a type in canonical form, e.g. `fn<A: Clonable, B>(A, B)`
    pub fn display(&self, t: TypeId) -> String {
        let mut ctx = DisplayCtx::default();
        let mut out = String::new();
        self.fmt_type(t, &mut ctx, &mut out);
        out
    }

    /// Render a trait instance, e.g. `S<i32>`
    pub fn display_instance(&self, i: InstanceId) -> String {
        let mut ctx = DisplayCtx::default();
        let mut out = String::new();
        self.fmt_instance(i, &mut ctx, &mut out);
        out
    }

    fn fmt_type(&self, t: TypeId, ctx: &mut DisplayCtx, out: &mut String) {
        let t = self.resolved(t);
        match self.kind(t) {
            TypeKind::Prim(p) => out.push_str(p.name()),
            TypeKind::Unknown(id) => {
                out.push('?');
                out.push_str(&id.to_string());
            }
            TypeKind::Var(data) => match ctx.names.get(&t) {
                Some(name) => out.push_str(name),
                None => out.push_str(&data.id.to_string()),
            },
            TypeKind::Tuple(_) => {
                self.fmt_binders(t, ctx, out);
                self.fmt_children(t, ctx, out);
            }
            TypeKind::Fn(_) => {
                out.push_str("fn");
                self.fmt_binders(t, ctx, out);
                self.fmt_children(t, ctx, out);
            }
        }
    }

    fn fmt_binders(&self, t: TypeId, ctx: &mut DisplayCtx, out: &mut String) {
        let binders = self.node(t).bound_vars.clone();
        if binders.is_empty() {
            return;
        }
        // name every binder first; bounds may reference later variables
        for &v in &binders {
            let v = self.resolved(v);
            let name = ctx.fresh_name();
            ctx.names.insert(v, name);
        }
        out.push('<');
        for (i, &v) in binders.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let v = self.resolved(v);
            out.push_str(&ctx.names[&v].clone());
            let bounds = self.var_bounds(v).to_vec();
            for (j, b) in bounds.into_iter().enumerate() {
                out.push_str(if j == 0 { ": " } else { " + " });
                self.fmt_instance(b, ctx, out);
            }
        }
        out.push('>');
    }

    fn fmt_children(&self, t: TypeId, ctx: &mut DisplayCtx, out: &mut String) {
        let children = self.kind(t).children().to_vec();
        out.push('(');
        for (i, c) in children.into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.fmt_type(c, ctx, out);
        }
        out.push(')');
    }

    fn fmt_instance(&self, i: InstanceId, ctx: &mut DisplayCtx, out: &mut String) {
        let i = self.inst_resolved(i);
        let inst = self.instance(i);
        let trait_id = inst.trait_id;
        let args = inst.args.clone();
        out.push_str(self.trait_name(trait_id));
        if !args.is_empty() {
            out.push('<');
            for (idx, a) in args.into_iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                self.fmt_type(a, ctx, out);
            }
            out.push('>');
        }
    }
}
