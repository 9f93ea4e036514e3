pub mod binding_builder;
pub mod binding_glsl;
pub mod pipelines;
pub mod shader;
pub mod uniformbuffer;

pub use binding_builder::*;

// Number of one dimensional workgroups needed to cover `total_size` threads.
pub fn compute_group_size_1d(total_size: u32, group_local_size: u32) -> u32 {
    (total_size + group_local_size - 1) / group_local_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_size_covers_all_threads() {
        assert_eq!(compute_group_size_1d(0, 64), 0);
        assert_eq!(compute_group_size_1d(1, 64), 1);
        assert_eq!(compute_group_size_1d(64, 64), 1);
        assert_eq!(compute_group_size_1d(65, 64), 2);
        assert_eq!(compute_group_size_1d(8000, 64), 125);
    }
}
