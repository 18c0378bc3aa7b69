///////////////////
// Vector macros //
///////////////////

/// Debug assertion that all slices have the same length
///
/// No-op in release builds.
#[macro_export]
macro_rules! debug_assert_same_len {
    ($($vec:expr),+ $(,)?) => {
        {
            #[cfg(debug_assertions)]
            {
                let lengths: Vec<usize> = vec![$($vec.len()),+];
                let first_len = lengths[0];

                if !lengths.iter().all(|&len| len == first_len) {
                    panic!(
                        "Slices {} have different lengths: {:?}",
                        stringify!($($vec),+),
                        lengths
                    );
                }
            }
        }
    };
}
