use core::arch::asm;

/// Point-sampled fetch of element `x` from a 1D linear `f32` texture.
#[inline]
pub unsafe fn _tex_1d_fetch_f32(tex_object: u64, x: i32) -> f32 {
    let mut res: f32;
    asm! {
        "tex.1d.v4.f32.s32 {{{f1}, {f2}, {f3}, {f4}}}, [{tex_object}, {{{x}}}];",
        tex_object = in(reg64) tex_object,
        x = in(reg32) x,
        f1 = out(reg32) res,
        f2 = out(reg32) _,
        f3 = out(reg32) _,
        f4 = out(reg32) _,
    }
    res
}
