//! Startup errors: configuration and pool construction.

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        R2D2(::diesel::r2d2::PoolError);
        ParseInt(::std::num::ParseIntError);
    }

    errors {
        MissingSetting(name: &'static str) {
            description("missing setting")
            display("missing required setting: {}", name)
        }
    }
}
