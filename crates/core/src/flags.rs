bitflags::bitflags! {
    /// Write flags passed to the entity writer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EditFlags: u8 {
        const NONE = 0;
        /// The entity must not exist yet.
        const NEW = 1;
        /// The entity must already exist.
        const UPDATE = 1 << 1;
        /// Mark the edit as a bot edit.
        const FORCE_BOT = 1 << 2;
        /// Skip storage-level constraint checks (uniqueness of site links).
        const IGNORE_CONSTRAINTS = 1 << 3;
    }
}
