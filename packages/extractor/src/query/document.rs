//! Copies a parsed roxmltree element into an sxd-document package.

use std::collections::HashMap;

use roxmltree::{Node, NodeType};
use sxd_document::dom::{Document, Element};
use sxd_document::{Package, QName};

/// Build a query document whose only element child is a copy of `top`.
///
/// Names keep their namespace URI and the prefix they were written with, so
/// `name()` and node snapshots report `dc:title` rather than `title`.
#[must_use]
pub fn materialize(top: Node<'_, '_>) -> Package {
    let package = Package::new();
    copy_into(&package.as_document(), top);
    package
}

fn copy_into<'d>(document: &Document<'d>, top: Node<'_, '_>) {
    // Keyed by roxmltree node index; descendants() visits parents first.
    let mut elements: HashMap<u32, Element<'d>> = HashMap::new();

    for node in top.descendants() {
        let parent = node
            .parent()
            .and_then(|p| elements.get(&p.id().get()).copied());

        match node.node_type() {
            NodeType::Element => {
                let element = copy_element(document, node);
                match parent {
                    Some(parent) => parent.append_child(element),
                    None => document.root().append_child(element),
                }
                elements.insert(node.id().get(), element);
            }
            NodeType::Text => {
                if let (Some(parent), Some(text)) = (parent, node.text()) {
                    parent.append_child(document.create_text(text));
                }
            }
            NodeType::Comment => {
                if let (Some(parent), Some(text)) = (parent, node.text()) {
                    parent.append_child(document.create_comment(text));
                }
            }
            NodeType::PI => {
                if let (Some(parent), Some(pi)) = (parent, node.pi()) {
                    parent.append_child(document.create_processing_instruction(pi.target, pi.value));
                }
            }
            NodeType::Root => {}
        }
    }
}

fn copy_element<'d>(document: &Document<'d>, node: Node<'_, '_>) -> Element<'d> {
    let tag = node.tag_name();
    let element = document.create_element(QName::with_namespace_uri(tag.namespace(), tag.name()));

    for namespace in node.namespaces() {
        let Some(prefix) = namespace.name() else {
            continue;
        };
        let inherited = node
            .parent_element()
            .and_then(|parent| parent.lookup_namespace_uri(Some(prefix)));
        if inherited != Some(namespace.uri()) {
            element.register_prefix(prefix, namespace.uri());
        }
    }
    if let Some(uri) = tag.namespace() {
        element.set_preferred_prefix(node.lookup_prefix(uri).filter(|p| !p.is_empty()));
    }

    for attribute in node.attributes() {
        let name = QName::with_namespace_uri(attribute.namespace(), attribute.name());
        let copied = element.set_attribute_value(name, attribute.value());
        if let Some(uri) = attribute.namespace() {
            copied.set_preferred_prefix(node.lookup_prefix(uri).filter(|p| !p.is_empty()));
        }
    }

    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roxmltree::Document as Source;
    use sxd_document::dom::ChildOfRoot;

    fn copied_root(package: &Package) -> Element<'_> {
        package
            .as_document()
            .root()
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(element),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_copies_names_attributes_and_text() {
        let source = Source::parse(r#"<book id="7" xmlns:dc="urn:dc"><dc:title>Dune</dc:title>!</book>"#).unwrap();
        let package = materialize(source.root_element());
        let book = copied_root(&package);

        assert_eq!(book.name().local_part(), "book");
        assert_eq!(book.attribute_value("id"), Some("7"));
        assert_eq!(book.children().len(), 2);
        assert_eq!(book.namespace_uri_for_prefix("dc"), Some("urn:dc"));
    }

    #[test]
    fn test_copies_only_the_given_element() {
        let source = Source::parse("<shelf><book>a</book><book>b</book></shelf>").unwrap();
        let second = source.root_element().last_element_child().unwrap();
        let package = materialize(second);
        let book = copied_root(&package);

        assert_eq!(book.name().local_part(), "book");
        assert_eq!(package.as_document().root().children().len(), 1);
    }
}
