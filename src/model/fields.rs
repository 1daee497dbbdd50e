/// Field names a property record may carry and that notifications are
/// allowed to report on.
pub const PROPERTY_FIELDS: &[&str] = &[
    "recordingDate",
    "lastNameOrCorpName",
    "firstName",
    "middleName",
    "generation",
    "role",
    "partyType",
    "grantorOrGrantee",
    "book",
    "page",
    "itemNumber",
    "instrumentTypeCode",
    "instrumentTypeName",
    "parcelId",
    "referenceBook",
    "referencePage",
    "remark1",
    "remark2",
    "instrumentId",
    "returnCode",
    "numberOfAttempts",
    "insertTimestamp",
    "editFlag",
    "version",
    "attempts",
];

pub fn is_property_field(name: &str) -> bool {
    PROPERTY_FIELDS.contains(&name)
}

/// Returns every key that is not a recognized property field, in the order
/// the keys were given.
pub fn invalid_fields<'a, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    keys.into_iter()
        .filter(|key| !is_property_field(key))
        .cloned()
        .collect()
}
