/// Server keys, tool arguments and defaults
///
/// The `Raven/...` strings are the server's own setting names and must match
/// exactly.

use std::time::Duration;

/// Extension of one database's dump file
pub const DEFAULT_DUMP_EXTENSION: &str = ".ravendump";

/// Dump tool looked up next to the running binary when no path is configured
pub const DEFAULT_TOOL_NAME: &str = "Raven.Smuggler.exe";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/";

/// Page size for database and index listings
pub const DEFAULT_PAGE_SIZE: usize = 100;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

pub const DEFAULT_LOG_DIR: &str = "logs";

/// Prefix of `Raven/DataDir`, relative to the server's data root
pub const DEFAULT_DATA_DIR_PREFIX: &str = "~\\";

/// Bundles every recreated database starts with
pub const DEFAULT_BUNDLES: &[&str] = &["Encryption", "Compression"];

// Database document
pub const DATABASE_DOC_PREFIX: &str = "Raven/Databases/";
pub const DATA_DIR_SETTING: &str = "Raven/DataDir";
pub const ACTIVE_BUNDLES_SETTING: &str = "Raven/ActiveBundles";
pub const BUNDLE_SEPARATOR: char = ';';
pub const ALLOW_BUNDLES_CHANGE_HEADER: &str = "Raven-Temp-Allow-Bundles-Change";

// Secured encryption settings
pub const ENCRYPTION_KEY_SETTING: &str = "Raven/Encryption/Key";
pub const ENCRYPTION_ALGORITHM_SETTING: &str = "Raven/Encryption/Algorithm";
pub const ENCRYPTION_KEY_BITS_SETTING: &str = "Raven/Encryption/KeyBitsPreference";
pub const ENCRYPT_INDEXES_SETTING: &str = "Raven/Encryption/EncryptIndexes";
pub const ENCRYPTION_ALGORITHM: &str = "System.Security.Cryptography.RijndaelManaged, mscorlib";
pub const ENCRYPTION_KEY_BITS: usize = 256;

// Dump tool
pub const EXPORT_ACTION: &str = "out";
pub const IMPORT_ACTION: &str = "in";
pub const DEFAULT_EXPORT_ARGS: &[&str] = &["--operate-on-types=Documents"];
pub const DEFAULT_IMPORT_ARGS: &[&str] = &["--disable-versioning-during-import=true"];

/// Keeps the import from overwriting the target's own encryption verification document
pub const IMPORT_VERIFICATION_FILTER: &str =
    "--negative-metadata-filter:@id=Raven/Encryption/Verification";

// Environment overrides
pub const ENV_SERVER_URL: &str = "FLEET_SERVER_URL";
pub const ENV_BACKUP_DIR: &str = "FLEET_BACKUP_DIR";
pub const ENV_TOOL_PATH: &str = "FLEET_TOOL_PATH";
pub const ENV_LOG_DIR: &str = "FLEET_LOG_DIR";

/// Per-request limit for admin API calls
pub const ADMIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
