//! Refresher identifiers.
//!
//! Each refresher kind owns exactly one id. Ids are never reassigned.

use uuid::{Uuid, uuid};

pub const CONTENT: Uuid = uuid!("900a4fbe-df3c-41e6-bb77-be896cd158ea");
pub const MEDIA: Uuid = uuid!("b29286dd-2d40-4ddb-b325-681226589fec");
pub const CONTENT_TYPE: Uuid = uuid!("6902e22c-9c10-483c-91f3-66b7cae9e2f5");
pub const DATA_TYPE: Uuid = uuid!("35b16c25-a17e-45d7-bc8f-edab1dcc28d2");
pub const DICTIONARY: Uuid = uuid!("d1d7e227-f817-4816-bfe9-6c39b6152884");
pub const DOMAIN: Uuid = uuid!("11290a79-4b57-4c99-ad72-7748a3cf38af");
pub const LANGUAGE: Uuid = uuid!("3e0f95d8-0be5-44b8-8394-2b8750b62654");
pub const MACRO: Uuid = uuid!("7b1e683c-5f34-43dd-803d-9699ea1e98ca");
pub const MEMBER: Uuid = uuid!("e285df34-acdc-4226-ae32-c0cb5cf388da");
pub const MEMBER_GROUP: Uuid = uuid!("187f236b-bd21-4c85-8a7c-29fba3d6c00c");
pub const PUBLIC_ACCESS: Uuid = uuid!("1db08769-b104-4f8b-850e-169cac1df2ec");
pub const RELATION_TYPE: Uuid = uuid!("d8375aba-4fb3-4f86-b505-92fba1b6f7c9");
pub const TEMPLATE: Uuid = uuid!("dd12b6a0-14b9-46e8-8800-c154f74047c8");
pub const USER: Uuid = uuid!("e057af6d-2ee6-41f4-8045-3694010f0aa6");
pub const USER_GROUP: Uuid = uuid!("45178038-b232-4fe8-aa1a-f2b949c44762");
pub const USER_PERMISSIONS: Uuid = uuid!("840ab9c5-5c0b-48db-a77e-29fe4b80cd3a");
pub const STYLESHEET: Uuid = uuid!("e0633648-0deb-44ae-9a48-75c3a55cb670");
pub const SECTION: Uuid = uuid!("b15f34a1-bc1d-4f8b-8369-3222728ab4c8");
pub const APPLICATION_TREE: Uuid = uuid!("0ac6c028-9860-4ea4-958d-14d39f45886e");

/// Every refresher id, in registration order.
pub const ALL: [Uuid; 19] = [
    CONTENT,
    MEDIA,
    CONTENT_TYPE,
    DATA_TYPE,
    DICTIONARY,
    DOMAIN,
    LANGUAGE,
    MACRO,
    MEMBER,
    MEMBER_GROUP,
    PUBLIC_ACCESS,
    RELATION_TYPE,
    TEMPLATE,
    USER,
    USER_GROUP,
    USER_PERMISSIONS,
    STYLESHEET,
    SECTION,
    APPLICATION_TREE,
];
