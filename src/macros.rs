/// returns name of current function.
macro_rules! fn_name_bare {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("?")
    }};
}

/// returns name of current function plus "()"
macro_rules! fn_name {
    () => {{
        format!("{}()", crate::macros::fn_name_bare!())
    }};
}

/// logs at debug level if scope duration exceeds a threshold.
/// See [crate::ScopeDurationLogger]
macro_rules! log_slow_scope {
    () => {
        let log_slow_scope_desc = $crate::macros::fn_name!();
        let _____x = $crate::ScopeDurationLogger::new_default_threshold(&log_slow_scope_desc);
    };
    ($description: expr) => {
        let log_slow_scope_desc = $description;
        let _____x = $crate::ScopeDurationLogger::new_default_threshold(&log_slow_scope_desc);
    };
}

pub(crate) use fn_name;
pub(crate) use fn_name_bare;
pub(crate) use log_slow_scope;
