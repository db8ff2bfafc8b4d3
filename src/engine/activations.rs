use super::ActFnSpec;

/// An element-wise activation function.
#[derive(Debug, Clone, Copy)]
pub enum ActFn {
    Sigmoid { amp: f32 },
}

impl ActFn {
    pub fn f(&self, z: f32) -> f32 {
        match *self {
            ActFn::Sigmoid { amp } => amp / (1. + (-z).exp()),
        }
    }

    pub fn df(&self, z: f32) -> f32 {
        match *self {
            ActFn::Sigmoid { amp } => (amp * (-z).exp()) / ((-z).exp() + 1.).powi(2),
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(value: ActFnSpec) -> Self {
        match value {
            ActFnSpec::Sigmoid { amp } => ActFn::Sigmoid { amp },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_derivative_matches_finite_difference() {
        let act_fn = ActFn::Sigmoid { amp: 2. };
        let h = 1e-3;

        for z in [-2., -0.5, 0., 0.7, 3.] {
            let numeric = (act_fn.f(z + h) - act_fn.f(z - h)) / (2. * h);
            assert!((numeric - act_fn.df(z)).abs() < 1e-3, "z = {z}");
        }
    }
}
