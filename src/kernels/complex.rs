//! Elementwise complex-arithmetic kernels
//!
//! Small building blocks shared by the forward and adjoint operators. All
//! functions work over flat slices and either write into a caller-provided
//! output buffer or mutate in place, so the hot loops allocate nothing.

use num_complex::Complex64;

/// out[i] = a[i] * b[i]
#[inline]
pub fn mul(out: &mut [Complex64], a: &[Complex64], b: &[Complex64]) {
    for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o = x * y;
    }
}

/// a[i] *= b[i]
#[inline]
pub fn mul_inplace(a: &mut [Complex64], b: &[Complex64]) {
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x *= y;
    }
}

/// a[i] *= conj(b[i])
#[inline]
pub fn mul_conj_inplace(a: &mut [Complex64], b: &[Complex64]) {
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x *= y.conj();
    }
}

/// a[i] *= w[i] for a real-valued weight image
#[inline]
pub fn mul_real_inplace(a: &mut [Complex64], w: &[f64]) {
    for (x, &y) in a.iter_mut().zip(w.iter()) {
        *x *= y;
    }
}

/// out[i] = |a[i]|^2
#[inline]
pub fn abs2(out: &mut [f64], a: &[Complex64]) {
    for (o, &x) in out.iter_mut().zip(a.iter()) {
        *o = x.norm_sqr();
    }
}

/// out[i] += w * |a[i]|^2
#[inline]
pub fn abs2_acc(out: &mut [f64], a: &[Complex64], w: f64) {
    for (o, &x) in out.iter_mut().zip(a.iter()) {
        *o += w * x.norm_sqr();
    }
}

/// out[i] = arg(a[i])
#[inline]
pub fn angle(out: &mut [f64], a: &[Complex64]) {
    for (o, &x) in out.iter_mut().zip(a.iter()) {
        *o = x.arg();
    }
}

/// acc[i] += w * a[i]
#[inline]
pub fn axpy(acc: &mut [Complex64], a: &[Complex64], w: f64) {
    for (o, &x) in acc.iter_mut().zip(a.iter()) {
        *o += w * x;
    }
}

/// Real inner product of the realified fields: sum_i Re(conj(a[i]) * b[i])
#[inline]
pub fn dot_re(a: &[Complex64], b: &[Complex64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x.conj() * y).re)
        .sum()
}

/// True when every element is finite in both parts
#[inline]
pub fn all_finite(a: &[Complex64]) -> bool {
    a.iter().all(|c| c.re.is_finite() && c.im.is_finite())
}
