use uuid::Uuid;

pub const TASK_ID_PREFIX: &str = "task-";

/// Number of random hex digits after [`TASK_ID_PREFIX`].
const TASK_ID_HEX_LEN: usize = 8;

/// Generate a candidate task ID of the form `task-` + 8 lowercase hex digits.
///
/// The digits are the first four bytes of a v4 UUID, which are fully random.
/// Candidates may collide; uniqueness is established by the caller probing
/// the repository.
pub fn gen_task_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{TASK_ID_PREFIX}{}", &simple[..TASK_ID_HEX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_has_prefix_and_eight_hex_digits() {
        let id = gen_task_id();
        let digits = id.strip_prefix(TASK_ID_PREFIX).expect("prefix");
        assert_eq!(digits.len(), TASK_ID_HEX_LEN);
        assert!(digits.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn consecutive_ids_differ() {
        let ids: std::collections::HashSet<String> = (0..64).map(|_| gen_task_id()).collect();
        assert!(ids.len() > 60);
    }
}
