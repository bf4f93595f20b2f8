pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USER_FIELD_MAX_LENGTH: usize = 150;
pub const RECIPE_NAME_MAX_LENGTH: usize = 255;

/// `data:image/<subtype>` -> stored file extension
pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

pub const CATALOG_CACHE_KEY: &str = "catalog-cache-key";

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const DEVELOPMENT_JWT_SECRET: &str = "foodgram-development-secret";
